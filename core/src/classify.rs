//! Error classification: every failure that leaves the pipeline passes
//! through `ErrorClassifier::handle`, which settles its final kind and
//! message, reports it to the logger, and notifies status observers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use crate::error::{BoxError, ErrorKind, FetchError};

/// Phrasings transports use for failures below HTTP.
static NETWORK_FAILURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)failed to fetch|networkerror|network request failed|load failed|network error|connection (refused|reset|closed|aborted)|\btimed? ?out\b|\bdns\b|econnrefused|enotfound|etimedout|econnreset|enetunreach|ehostunreach|offline|\baborted\b",
    )
    .expect("network failure pattern is valid")
});

/// Whether `message` reads like a network-level failure.
pub fn is_network_message(message: &str) -> bool {
    NETWORK_FAILURE.is_match(message)
}

/// Input to the classifier.
#[derive(Debug)]
pub enum RawFailure {
    /// Already one of ours.
    Typed(FetchError),
    /// A generic error from host or application code.
    Failure(BoxError),
    /// A host reported something that is not an error value.
    Opaque(String),
}

impl From<FetchError> for RawFailure {
    fn from(err: FetchError) -> Self {
        RawFailure::Typed(err)
    }
}

/// What the logger receives.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorLogEntry {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    pub details: Option<Value>,
}

pub type ErrorLogger = Arc<dyn Fn(&ErrorLogEntry) + Send + Sync>;

/// Statuses that have observer hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTrigger {
    Unauthorized,
    Forbidden,
    RateLimited,
}

impl StatusTrigger {
    pub fn status(&self) -> u16 {
        match self {
            StatusTrigger::Unauthorized => 401,
            StatusTrigger::Forbidden => 403,
            StatusTrigger::RateLimited => 429,
        }
    }
}

pub type StatusHook = Arc<dyn Fn(&FetchError) + Send + Sync>;

/// Built-in status messages; callers may override or extend them.
pub fn default_status_messages() -> BTreeMap<u16, String> {
    [
        (400, "Bad Request: The server could not understand the request"),
        (401, "Unauthorized: Authentication is required"),
        (403, "Forbidden: You do not have permission to access this resource"),
        (404, "Not Found: The requested resource could not be found"),
        (500, "Internal Server Error: The server encountered an unexpected condition"),
    ]
    .into_iter()
    .map(|(status, message)| (status, message.to_string()))
    .collect()
}

/// Default logger: one `tracing` error event per classified failure.
pub fn tracing_logger() -> ErrorLogger {
    Arc::new(|entry: &ErrorLogEntry| {
        tracing::error!(
            kind = %entry.kind,
            status = entry.status,
            details = ?entry.details,
            "{}",
            entry.message
        );
    })
}

#[derive(Clone)]
pub struct ErrorClassifier {
    status_messages: BTreeMap<u16, String>,
    logger: Option<ErrorLogger>,
    hooks: Vec<(StatusTrigger, StatusHook)>,
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("status_messages", &self.status_messages)
            .field("logging", &self.logger.is_some())
            .field("hooks", &self.hooks.iter().map(|(t, _)| *t).collect::<Vec<_>>())
            .finish()
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            status_messages: default_status_messages(),
            logger: Some(tracing_logger()),
            hooks: Vec::new(),
        }
    }
}

impl ErrorClassifier {
    /// Defaults without logging.
    pub fn silent() -> Self {
        Self {
            logger: None,
            ..Self::default()
        }
    }

    /// Overlay `messages` onto the built-in table.
    pub fn with_status_messages(mut self, messages: BTreeMap<u16, String>) -> Self {
        self.status_messages.extend(messages);
        self
    }

    /// Replace the logger; `None` turns logging off.
    pub fn with_logger(mut self, logger: Option<ErrorLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Register an observer for `trigger`. Hooks for the same status fire in
    /// registration order.
    pub fn on_status<F>(mut self, trigger: StatusTrigger, hook: F) -> Self
    where
        F: Fn(&FetchError) + Send + Sync + 'static,
    {
        self.hooks.push((trigger, Arc::new(hook)));
        self
    }

    pub fn status_message(&self, status: u16) -> String {
        self.status_messages
            .get(&status)
            .cloned()
            .unwrap_or_else(|| format!("HTTP Error {status}"))
    }

    /// Normalize `raw` into a `FetchError`. Never fails.
    pub fn handle(&self, raw: RawFailure) -> FetchError {
        let err = self.classify(raw);
        if let Some(logger) = &self.logger {
            logger(&ErrorLogEntry {
                kind: err.kind(),
                message: err.message(),
                status: err.status(),
                details: err.details().cloned(),
            });
        }
        let status = err.status();
        for (trigger, hook) in &self.hooks {
            if trigger.status() == status && err.kind() == ErrorKind::HttpStatus {
                hook(&err);
            }
        }
        err
    }

    fn classify(&self, raw: RawFailure) -> FetchError {
        match raw {
            RawFailure::Typed(FetchError::HttpStatus { status, details, .. }) => FetchError::HttpStatus {
                status,
                message: self.status_message(status),
                details,
            },
            RawFailure::Typed(other) => other,
            RawFailure::Failure(source) => {
                let text = source.to_string();
                if is_network_message(&text) {
                    FetchError::Network {
                        message: format!("Network error: {text}"),
                        source: Some(source),
                    }
                } else {
                    FetchError::Application {
                        message: format!("Unexpected error: {text}"),
                        source: Some(source),
                    }
                }
            }
            RawFailure::Opaque(value) => FetchError::Unknown {
                message: format!("Unknown error: {value}"),
            },
        }
    }
}
