//! Client configuration.
//!
//! # Design
//! Plain data that can be written by hand in Rust or deserialized from the
//! JSON a foreign host passes through the C ABI. Callbacks (validators,
//! hooks, loggers) are not data and are attached on `ClientBuilder` instead.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::FetchError;
use crate::headers::HeaderSet;
use crate::resolve::QueryMerge;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Base for relative endpoint paths.
    pub base_url: Option<String>,
    /// Headers every request starts from.
    pub default_headers: HeaderSet,
    /// Overrides for the status → message table.
    pub status_messages: BTreeMap<u16, String>,
    /// Whether classified errors go to the logger.
    pub log_errors: bool,
    pub query_merge: QueryMerge,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderSet::new(),
            status_messages: BTreeMap::new(),
            log_errors: true,
            query_merge: QueryMerge::Replace,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FetchError> {
        serde_json::from_str(raw).map_err(|e| FetchError::Application {
            message: format!("invalid client configuration: {e}"),
            source: Some(Box::new(e)),
        })
    }
}
