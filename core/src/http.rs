//! HTTP transport types for the host-does-IO pattern.
//!
//! # Design
//! Requests and responses are plain data. The core builds `HttpRequest`
//! values and normalizes `RawResponse` values; the bytes on the wire are the
//! business of a `Transport` implementation supplied by the host (a native
//! HTTP client, a webview bridge, or a C caller through the FFI crate).

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BoxError, FetchError};
use crate::headers::HeaderSet;

/// The closed set of verbs the pipeline dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            other => Err(FetchError::Application {
                message: format!("unsupported HTTP method: {other}"),
                source: None,
            }),
        }
    }
}

/// Payload attached to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    Binary(Bytes),
}

impl RequestBody {
    /// Content type implied by the payload, applied only when the caller's
    /// headers do not already name one.
    pub fn implied_content_type(&self) -> Option<&'static str> {
        match self {
            RequestBody::Json(_) => Some("application/json"),
            RequestBody::Text(_) => Some("text/plain; charset=utf-8"),
            RequestBody::Binary(_) => None,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            RequestBody::Json(value) => Bytes::from(value.to_string()),
            RequestBody::Text(text) => Bytes::from(text.clone()),
            RequestBody::Binary(bytes) => bytes.clone(),
        }
    }
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Binary(bytes)
    }
}

/// Options handed to the transport. A method set here is always overridden
/// by the method the orchestrator was asked to send.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Option<HttpMethod>,
    pub headers: HeaderSet,
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    /// Finalize the options into a request for `url`; `method` wins.
    pub fn into_request(self, url: url::Url, method: HttpMethod) -> HttpRequest {
        HttpRequest {
            method,
            url,
            headers: self.headers,
            body: self.body,
        }
    }
}

/// A fully resolved, validated request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: url::Url,
    pub headers: HeaderSet,
    pub body: Option<RequestBody>,
}

/// `Response.type` as reported by fetch-style transports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Basic,
    Cors,
    #[default]
    Default,
    Error,
    Opaque,
    #[serde(rename = "opaqueredirect")]
    OpaqueRedirect,
}

/// What the transport hands back: status line, headers (repeats allowed),
/// where the request ended up, and the undecoded body.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub final_url: String,
    pub redirected: bool,
    pub response_type: ResponseType,
    pub body: Bytes,
}

impl RawResponse {
    /// A plain response with no redirect and the default response type.
    pub fn new(status: u16, final_url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Vec::new(),
            final_url: final_url.into(),
            redirected: false,
            response_type: ResponseType::Default,
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Every value for `name`, compared case-insensitively, in arrival order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Failure reported by a transport.
pub type TransportError = BoxError;

/// The fetch-like primitive the host supplies.
pub trait Transport: Send + Sync {
    fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<RawResponse, TransportError> + Send + Sync,
{
    fn dispatch(&self, request: &HttpRequest) -> Result<RawResponse, TransportError> {
        self(request)
    }
}
