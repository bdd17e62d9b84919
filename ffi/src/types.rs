//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, pointer + length instead of `Vec`, and
//! enums with explicit discriminants. Envelopes cross as JSON strings so the
//! C side needs no struct per body shape. Conversion functions live here to
//! keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use unifetch_core::{ErrorKind, FetchError, HttpMethod, HttpRequest, RawResponse, ResponseType};

/// Opaque handle to a `Client`. C callers receive a pointer to this and pass
/// it back into every FFI function.
pub struct FfiClient {
    pub(crate) inner: unifetch_core::Client,
}

// ---------------------------------------------------------------------------
// Strings
// ---------------------------------------------------------------------------

/// Allocate a C string. Interior NUL bytes are dropped rather than failing.
pub(crate) fn c_string(s: impl Into<Vec<u8>>) -> *mut c_char {
    let c = CString::new(s).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|&b| b != 0);
        CString::new(bytes).unwrap_or_default()
    });
    c.into_raw()
}

/// Read a nullable C string, replacing invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives the
/// call.
pub(crate) unsafe fn read_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

/// Free a C string allocated by `c_string`. Null is ignored.
pub(crate) fn free_c_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(unsafe { CString::from_raw(ptr) });
    }
}

/// Copy `len` bytes from a caller-owned buffer. Null reads as empty.
///
/// # Safety
/// `ptr` must be null or valid for `len` bytes.
pub(crate) unsafe fn bytes_from_raw(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        Vec::new()
    } else {
        unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Patch = 3,
    Delete = 4,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Patch => FfiHttpMethod::Patch,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A single HTTP header as a pair of C strings.
///
/// Owned by the library when it appears in an `FfiHttpRequest`; owned by
/// the caller when passed in through `FfiHttpResponse`.
#[repr(C)]
pub struct FfiHeader {
    pub name: *mut c_char,
    pub value: *mut c_char,
}

/// A resolved HTTP request described as C-compatible plain data.
///
/// The C caller executes it and passes the outcome back through
/// `unifetch_parse_response` or `unifetch_transport_failure`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: usize,
    /// Null when the request has no body.
    pub body: *mut u8,
    pub body_len: usize,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: HttpRequest) -> *mut Self {
        let headers: Box<[FfiHeader]> = req
            .headers
            .into_vec()
            .into_iter()
            .map(|(name, value)| FfiHeader {
                name: c_string(name),
                value: c_string(value),
            })
            .collect();
        let headers_len = headers.len();
        let headers = if headers_len == 0 {
            std::ptr::null_mut()
        } else {
            Box::into_raw(headers) as *mut FfiHeader
        };

        let (body, body_len) = match req.body {
            Some(b) => {
                let bytes: Box<[u8]> = b.to_bytes().to_vec().into_boxed_slice();
                let len = bytes.len();
                (Box::into_raw(bytes) as *mut u8, len)
            }
            None => (std::ptr::null_mut(), 0),
        };

        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url.to_string()),
            headers,
            headers_len,
            body,
            body_len,
        }))
    }

    /// Release everything `from_core` allocated.
    ///
    /// # Safety
    /// `req` must come from `from_core` and not have been freed.
    pub(crate) unsafe fn free(req: *mut Self) {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        if !req.headers.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(req.headers, req.headers_len);
            let headers = unsafe { Box::from_raw(slice) };
            for h in headers.iter() {
                free_c_string(h.name);
                free_c_string(h.value);
            }
        }
        if !req.body.is_null() {
            let slice = std::ptr::slice_from_raw_parts_mut(req.body, req.body_len);
            drop(unsafe { Box::from_raw(slice) });
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// Fetch-style `Response.type`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResponseType {
    Default = 0,
    Basic = 1,
    Cors = 2,
    Error = 3,
    Opaque = 4,
    OpaqueRedirect = 5,
}

impl From<FfiResponseType> for ResponseType {
    fn from(t: FfiResponseType) -> Self {
        match t {
            FfiResponseType::Default => ResponseType::Default,
            FfiResponseType::Basic => ResponseType::Basic,
            FfiResponseType::Cors => ResponseType::Cors,
            FfiResponseType::Error => ResponseType::Error,
            FfiResponseType::Opaque => ResponseType::Opaque,
            FfiResponseType::OpaqueRedirect => ResponseType::OpaqueRedirect,
        }
    }
}

/// An HTTP response described as C-compatible plain data.
///
/// The C caller fills this in after executing an `FfiHttpRequest` and passes
/// a pointer to `unifetch_parse_response`. The FFI layer copies but does not
/// free these fields. `status_text`, `headers` and `body` may be null.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub status_text: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: usize,
    pub body: *const u8,
    pub body_len: usize,
    pub final_url: *const c_char,
    pub redirected: bool,
    pub response_type: FfiResponseType,
}

impl FfiHttpResponse {
    /// Copy into a core `RawResponse`. Headers with a null name are skipped.
    ///
    /// # Safety
    /// Every non-null pointer must be valid for the lengths given.
    pub(crate) unsafe fn to_core(&self) -> RawResponse {
        let headers = if self.headers.is_null() {
            Vec::new()
        } else {
            unsafe { std::slice::from_raw_parts(self.headers, self.headers_len) }
                .iter()
                .filter_map(|h| {
                    let name = unsafe { read_str(h.name) }?;
                    let value = unsafe { read_str(h.value) }.unwrap_or_default();
                    Some((name, value))
                })
                .collect()
        };

        RawResponse {
            status: self.status,
            status_text: unsafe { read_str(self.status_text) }.unwrap_or_default(),
            headers,
            final_url: unsafe { read_str(self.final_url) }.unwrap_or_default(),
            redirected: self.redirected,
            response_type: self.response_type.into(),
            body: unsafe { bytes_from_raw(self.body, self.body_len) }.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error category. `None` on success; `NullArg` and `Panic` are raised by
/// the FFI layer itself.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorKind {
    None = 0,
    InvalidUrl = 1,
    InvalidHeader = 2,
    HttpStatus = 3,
    Network = 4,
    Application = 5,
    Unknown = 6,
    NullArg = 7,
    Panic = 8,
}

impl From<ErrorKind> for FfiErrorKind {
    fn from(k: ErrorKind) -> Self {
        match k {
            ErrorKind::InvalidUrl => FfiErrorKind::InvalidUrl,
            ErrorKind::InvalidHeader => FfiErrorKind::InvalidHeader,
            ErrorKind::HttpStatus => FfiErrorKind::HttpStatus,
            ErrorKind::Network => FfiErrorKind::Network,
            ErrorKind::Application => FfiErrorKind::Application,
            ErrorKind::Unknown => FfiErrorKind::Unknown,
        }
    }
}

/// A classified failure. All pointers are null when `kind` is `None`.
#[repr(C)]
pub struct FfiError {
    pub kind: FfiErrorKind,
    /// HTTP status, 0 for failures without one.
    pub status: u16,
    pub is_network_error: bool,
    pub message: *mut c_char,
    /// JSON diagnostic payload; null unless `kind` is `HttpStatus`.
    pub details_json: *mut c_char,
}

impl FfiError {
    pub(crate) fn none() -> Self {
        FfiError {
            kind: FfiErrorKind::None,
            status: 0,
            is_network_error: false,
            message: std::ptr::null_mut(),
            details_json: std::ptr::null_mut(),
        }
    }

    pub(crate) fn from_core(err: &FetchError) -> Self {
        FfiError {
            kind: err.kind().into(),
            status: err.status(),
            is_network_error: err.is_network_error(),
            message: c_string(err.message()),
            details_json: match err.details() {
                Some(details) => c_string(details.to_string()),
                None => std::ptr::null_mut(),
            },
        }
    }

    fn local(kind: FfiErrorKind, message: &str) -> Self {
        FfiError {
            kind,
            status: 0,
            is_network_error: false,
            message: c_string(message),
            details_json: std::ptr::null_mut(),
        }
    }

    pub(crate) fn null_arg(name: &str) -> Self {
        Self::local(FfiErrorKind::NullArg, &format!("null argument: {name}"))
    }

    pub(crate) fn panic(msg: &str) -> Self {
        Self::local(FfiErrorKind::Panic, msg)
    }

    fn free_fields(&self) {
        free_c_string(self.message);
        free_c_string(self.details_json);
    }
}

/// Result of `unifetch_parse_response`, `unifetch_transport_failure` and
/// `unifetch_classify_failure`.
///
/// On success `is_ok` is true and `envelope_json` holds the normalized
/// response. On failure `envelope_json` is null and `error` is filled in.
#[repr(C)]
pub struct FfiResult {
    pub is_ok: bool,
    pub envelope_json: *mut c_char,
    pub error: FfiError,
}

impl FfiResult {
    pub(crate) fn ok(envelope_json: String) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            is_ok: true,
            envelope_json: c_string(envelope_json),
            error: FfiError::none(),
        }))
    }

    pub(crate) fn err(error: FfiError) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            is_ok: false,
            envelope_json: std::ptr::null_mut(),
            error,
        }))
    }

    /// # Safety
    /// `result` must come from `ok` or `err` and not have been freed.
    pub(crate) unsafe fn free(result: *mut Self) {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.envelope_json);
        result.error.free_fields();
    }
}

/// Result of `unifetch_build_request`.
///
/// On success `request` points to the request to execute; on failure it is
/// null and `error` is filled in.
#[repr(C)]
pub struct FfiBuildResult {
    pub is_ok: bool,
    pub request: *mut FfiHttpRequest,
    pub error: FfiError,
}

impl FfiBuildResult {
    pub(crate) fn ok(req: HttpRequest) -> *mut Self {
        Box::into_raw(Box::new(FfiBuildResult {
            is_ok: true,
            request: FfiHttpRequest::from_core(req),
            error: FfiError::none(),
        }))
    }

    pub(crate) fn err(error: FfiError) -> *mut Self {
        Box::into_raw(Box::new(FfiBuildResult {
            is_ok: false,
            request: std::ptr::null_mut(),
            error,
        }))
    }

    /// # Safety
    /// `result` must come from `ok` or `err` and not have been freed.
    pub(crate) unsafe fn free(result: *mut Self) {
        let result = unsafe { Box::from_raw(result) };
        if !result.request.is_null() {
            unsafe { FfiHttpRequest::free(result.request) };
        }
        result.error.free_fields();
    }
}
