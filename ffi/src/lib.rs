//! C-ABI wrapper around `unifetch-core`.
//!
//! # Overview
//! Exposes the request pipeline through `extern "C"` functions so any
//! language with a C FFI gets the same URL resolution, header assembly,
//! response normalization and error classification while doing the HTTP
//! I/O itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - The host drives the split API: `unifetch_build_request` yields a request
//!   to execute, then `unifetch_parse_response` or
//!   `unifetch_transport_failure` finishes the call.
//! - Structured inputs (config, payload, query, headers) and the response
//!   envelope cross as JSON strings.
//! - The C caller owns all returned pointers and must call the matching
//!   `unifetch_free_*` function to release them.

pub mod types;

use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use unifetch_core::{ClientConfig, FetchError, HeaderSet, HttpMethod, QueryParams, RawFailure, RequestBody};

use types::*;

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a `Client` from a JSON `ClientConfig`.
///
/// A null `config_json` uses the defaults. Returns null if the config does
/// not parse, if its default headers are invalid, or if a panic occurs.
/// The caller must free the returned pointer with `unifetch_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_client_new(config_json: *const c_char) -> *mut FfiClient {
    catch_unwind(AssertUnwindSafe(|| {
        let config = match unsafe { read_str(config_json) } {
            None => ClientConfig::default(),
            Some(raw) => match ClientConfig::from_json_str(&raw) {
                Ok(config) => config,
                Err(_) => return std::ptr::null_mut(),
            },
        };
        match unifetch_core::Client::new(config) {
            Ok(client) => Box::into_raw(Box::new(FfiClient { inner: client })),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `Client` created by `unifetch_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Request construction
// ---------------------------------------------------------------------------

/// Resolve `path` against the client's base URL and assemble headers.
///
/// `method` is one of `GET`, `POST`, `PUT`, `PATCH`, `DELETE`. `payload_json`,
/// `query_json` (a flat object) and `headers_json` (an object of string
/// values) may be null. A JSON payload sets `Content-Type:
/// application/json` unless the headers already name one.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_build_request(
    client: *const FfiClient,
    method: *const c_char,
    path: *const c_char,
    payload_json: *const c_char,
    query_json: *const c_char,
    headers_json: *const c_char,
) -> *mut FfiBuildResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiBuildResult::err(FfiError::null_arg("client"));
        }
        let Some(method) = (unsafe { read_str(method) }) else {
            return FfiBuildResult::err(FfiError::null_arg("method"));
        };
        let Some(path) = (unsafe { read_str(path) }) else {
            return FfiBuildResult::err(FfiError::null_arg("path"));
        };
        let client = unsafe { &*client };

        let (method, payload, query, headers) = match build_inputs(&method, payload_json, query_json, headers_json) {
            Ok(inputs) => inputs,
            Err(e) => return FfiBuildResult::err(FfiError::from_core(&client.inner.classify(e.into()))),
        };
        match client
            .inner
            .build_request(method, &path, payload, query.as_ref(), headers.as_ref())
        {
            Ok(req) => FfiBuildResult::ok(req),
            Err(e) => FfiBuildResult::err(FfiError::from_core(&e)),
        }
    }))
    .unwrap_or_else(|_| FfiBuildResult::err(FfiError::panic("panic in unifetch_build_request")))
}

type BuildInputs = (HttpMethod, Option<RequestBody>, Option<QueryParams>, Option<HeaderSet>);

/// Decode the string arguments of `unifetch_build_request`.
fn build_inputs(
    method: &str,
    payload_json: *const c_char,
    query_json: *const c_char,
    headers_json: *const c_char,
) -> Result<BuildInputs, FetchError> {
    let method: HttpMethod = method.parse()?;

    let payload = match unsafe { read_str(payload_json) } {
        Some(raw) => Some(RequestBody::Json(parse_json(&raw, "payload")?)),
        None => None,
    };

    let query = match unsafe { read_str(query_json) } {
        Some(raw) => Some(QueryParams::from_json(&parse_json(&raw, "query")?)?),
        None => None,
    };

    let headers = match unsafe { read_str(headers_json) } {
        Some(raw) => Some(
            serde_json::from_str::<HeaderSet>(&raw).map_err(|e| FetchError::InvalidHeader {
                name: "*".to_string(),
                reason: format!("headers must be an object of strings: {e}"),
            })?,
        ),
        None => None,
    };

    Ok((method, payload, query, headers))
}

fn parse_json(raw: &str, what: &str) -> Result<serde_json::Value, FetchError> {
    serde_json::from_str(raw).map_err(|e| FetchError::Application {
        message: format!("invalid {what} JSON: {e}"),
        source: Some(Box::new(e)),
    })
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

/// Normalize the response the host received for a built request.
///
/// Returns the envelope as JSON on success; a status outside 200-299 comes
/// back as an `HttpStatus` error with the envelope in `details_json`.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_parse_response(
    client: *const FfiClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::err(FfiError::null_arg("client"));
        }
        if response.is_null() {
            return FfiResult::err(FfiError::null_arg("response"));
        }
        let client = unsafe { &*client };
        let raw = unsafe { (*response).to_core() };
        let envelope = match client.inner.parse_response(raw) {
            Ok(envelope) => envelope,
            Err(e) => return FfiResult::err(FfiError::from_core(&e)),
        };
        match serde_json::to_string(&envelope) {
            Ok(json) => FfiResult::ok(json),
            Err(e) => {
                let err = client.inner.classify(RawFailure::Failure(Box::new(e)));
                FfiResult::err(FfiError::from_core(&err))
            }
        }
    }))
    .unwrap_or_else(|_| FfiResult::err(FfiError::panic("panic in unifetch_parse_response")))
}

/// Report that the host's transport failed before any response arrived.
/// Always yields a `Network` error.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_transport_failure(client: *const FfiClient, message: *const c_char) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::err(FfiError::null_arg("client"));
        }
        let Some(message) = (unsafe { read_str(message) }) else {
            return FfiResult::err(FfiError::null_arg("message"));
        };
        let client = unsafe { &*client };
        let err = client.inner.transport_failure(message.into());
        FfiResult::err(FfiError::from_core(&err))
    }))
    .unwrap_or_else(|_| FfiResult::err(FfiError::panic("panic in unifetch_transport_failure")))
}

/// Classify an arbitrary host failure by its message: network-looking text
/// becomes `Network`, anything else `Application`.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_classify_failure(client: *const FfiClient, message: *const c_char) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::err(FfiError::null_arg("client"));
        }
        let Some(message) = (unsafe { read_str(message) }) else {
            return FfiResult::err(FfiError::null_arg("message"));
        };
        let client = unsafe { &*client };
        let err = client.inner.classify(RawFailure::Failure(message.into()));
        FfiResult::err(FfiError::from_core(&err))
    }))
    .unwrap_or_else(|_| FfiResult::err(FfiError::panic("panic in unifetch_classify_failure")))
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

/// Parse a `set-cookie` header value into a JSON array of cookies.
///
/// Returns null if `header_value` is null. Free with `unifetch_free_string`.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_parse_set_cookies(header_value: *const c_char) -> *mut c_char {
    catch_unwind(AssertUnwindSafe(|| {
        let Some(header) = (unsafe { read_str(header_value) }) else {
            return std::ptr::null_mut();
        };
        let cookies = unifetch_core::parse_set_cookie(&header);
        match serde_json::to_string(&cookies) {
            Ok(json) => c_string(json),
            Err(_) => std::ptr::null_mut(),
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiBuildResult` returned by `unifetch_build_request`, including
/// its request. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_free_build_result(result: *mut FfiBuildResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { FfiBuildResult::free(result) }));
}

/// Free an `FfiResult`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { FfiResult::free(result) }));
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn unifetch_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| free_c_string(s)));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
