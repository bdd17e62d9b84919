//! Typed error taxonomy for the request/response pipeline.
//!
//! # Design
//! Every call either resolves with a `ResponseEnvelope` or fails with exactly
//! one `FetchError`. Configuration problems (`InvalidUrl`, `InvalidHeader`)
//! surface before any I/O happens. `HttpStatus` keeps the whole decoded
//! response in `details` so callers can log or display it without another
//! lookup. Transport failures keep the original error as `source()`.

use std::fmt;

use serde_json::{json, Value};
use thiserror::Error;

/// Boxed error used for transport failures and generic host failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Discriminant of a `FetchError`, stable across the FFI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    InvalidHeader,
    HttpStatus,
    Network,
    Application,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidUrl => "InvalidUrl",
            ErrorKind::InvalidHeader => "InvalidHeader",
            ErrorKind::HttpStatus => "HttpStatusError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::Application => "ApplicationError",
            ErrorKind::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Relative path without a base URL, or a string that is not a URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Header name outside the token grammar, a rejected value, a failing
    /// validator hook, or a preset called with bad arguments.
    #[error("Invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    /// The transport answered with a status outside 200..=299.
    #[error("{message}")]
    HttpStatus {
        status: u16,
        message: String,
        details: Box<Value>,
    },

    /// The transport call itself failed (DNS, offline, aborted, timeout).
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A generic failure that does not look like a network problem.
    #[error("{message}")]
    Application {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Something that is not an error value at all was reported.
    #[error("{message}")]
    Unknown { message: String },
}

impl FetchError {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl fmt::Display) -> Self {
        FetchError::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_header(name: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::InvalidHeader {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failed transport call. Status is always 0.
    pub fn network(source: BoxError) -> Self {
        FetchError::Network {
            message: format!("Network error: {source}"),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUrl { .. } => ErrorKind::InvalidUrl,
            FetchError::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            FetchError::HttpStatus { .. } => ErrorKind::HttpStatus,
            FetchError::Network { .. } => ErrorKind::Network,
            FetchError::Application { .. } => ErrorKind::Application,
            FetchError::Unknown { .. } => ErrorKind::Unknown,
        }
    }

    /// HTTP status for `HttpStatus`, 500 for `Unknown`, 0 otherwise.
    pub fn status(&self) -> u16 {
        match self {
            FetchError::HttpStatus { status, .. } => *status,
            FetchError::Unknown { .. } => 500,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Diagnostic payload; only `HttpStatus` carries one.
    pub fn details(&self) -> Option<&Value> {
        match self {
            FetchError::HttpStatus { details, .. } => Some(details),
            _ => None,
        }
    }

    pub fn is_network_error(&self) -> bool {
        matches!(self, FetchError::Network { .. })
    }

    /// Whether retrying the same call could plausibly succeed. The pipeline
    /// never retries on its own.
    pub fn is_retriable(&self) -> bool {
        match self {
            FetchError::Network { .. } => true,
            FetchError::HttpStatus { status, .. } => *status == 429 || (500..=599).contains(status),
            _ => false,
        }
    }

    /// JSON rendering used by the C ABI and by log entries.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.kind().as_str(),
            "status": self.status(),
            "message": self.message(),
            "isNetworkError": self.is_network_error(),
            "details": self.details().cloned().unwrap_or(Value::Null),
        })
    }
}
