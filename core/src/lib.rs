//! Cross-platform HTTP request construction and response normalization.
//!
//! # Overview
//! Given an endpoint (base URL, path, query parameters), a payload, headers
//! and a verb, the core produces a validated request, hands it to a
//! host-supplied transport, and turns whatever comes back into one uniform
//! envelope (body, headers, cookies, metadata) or one typed error. Every
//! runtime that embeds the core, natively or through the C ABI, gets the same
//! behavior.
//!
//! # Design
//! - `Client` is stateless beyond its configuration; each call is a linear
//!   pipeline: `resolve` → `HeaderAssembler::create` → `Transport::dispatch`
//!   → `normalize`, with `ErrorClassifier::handle` on every failure path.
//! - The transport is a trait, so the core never does I/O itself. Hosts that
//!   cannot implement the trait use the split `build_request` /
//!   `parse_response` API instead.
//! - Errors are one closed taxonomy (`FetchError`); nothing is silently
//!   dropped except an unreadable cookie attribute and a body that fails to
//!   decode at its declared type (which falls back to text).

pub mod classify;
pub mod client;
pub mod config;
pub mod cookie;
pub mod error;
pub mod form;
pub mod headers;
pub mod http;
pub mod resolve;
pub mod response;

pub use classify::{ErrorClassifier, ErrorLogEntry, RawFailure, StatusTrigger};
pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use cookie::{parse_set_cookie, parse_set_cookies, Cookie, Expiry};
pub use error::{ErrorKind, FetchError};
pub use form::{FormData, FormField, FormValue};
pub use headers::{presets, HeaderAssembler, HeaderSet};
pub use http::{HttpMethod, HttpRequest, RawResponse, RequestBody, RequestOptions, ResponseType, Transport, TransportError};
pub use resolve::{resolve, QueryMerge, QueryParams, QueryValue, UrlResolver};
pub use response::{normalize, ResponseBody, ResponseEnvelope, ResponseMeta};
