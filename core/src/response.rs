//! Response normalization: decode the body by content type, lowercase the
//! headers, extract cookies, and either build the envelope or fail with
//! `HttpStatus`.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::cookie::{parse_set_cookies, Cookie};
use crate::error::FetchError;
use crate::form::{parse_multipart, FormData};
use crate::http::{RawResponse, ResponseType};

/// Decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
    Form(FormData),
    Binary(Bytes),
}

impl ResponseBody {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResponseBody::Json(_) => "json",
            ResponseBody::Text(_) => "text",
            ResponseBody::Form(_) => "form",
            ResponseBody::Binary(_) => "binary",
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            _ => None,
        }
    }

    /// JSON form of the body; binary becomes a base64 string.
    pub fn to_json(&self) -> Value {
        match self {
            ResponseBody::Json(v) => v.clone(),
            ResponseBody::Text(s) => Value::String(s.clone()),
            ResponseBody::Form(form) => serde_json::to_value(form).unwrap_or(Value::Null),
            ResponseBody::Binary(bytes) => Value::String(STANDARD.encode(bytes)),
        }
    }
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub url: String,
    pub response_type: ResponseType,
    pub redirected: bool,
}

/// What a successful call resolves with.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status: u16,
    pub body: ResponseBody,
    pub headers: BTreeMap<String, String>,
    pub cookies: Vec<Cookie>,
    pub meta: ResponseMeta,
}

impl ResponseEnvelope {
    /// Lookup by lowercase name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("status", &self.status)?;
        map.serialize_entry("body", &self.body)?;
        map.serialize_entry("bodyType", self.body.type_name())?;
        map.serialize_entry("headers", &self.headers)?;
        map.serialize_entry("cookies", &self.cookies)?;
        map.serialize_entry("meta", &self.meta)?;
        map.end()
    }
}

/// Lowercase every name; a repeated name keeps its last value.
pub fn normalize_headers(headers: &[(String, String)]) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
        .collect()
}

/// Decode by declared content type, falling back to text when the selected
/// decoder fails.
pub fn decode_body(content_type: Option<&str>, body: &Bytes) -> ResponseBody {
    let essence = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .unwrap_or_default();

    let decoded = if essence.contains("application/json") {
        serde_json::from_slice(body)
            .map(ResponseBody::Json)
            .map_err(|e| e.to_string())
    } else if essence.contains("text/") {
        String::from_utf8(body.to_vec())
            .map(ResponseBody::Text)
            .map_err(|e| e.to_string())
    } else if essence.contains("multipart/form-data") {
        parse_multipart(content_type.unwrap_or_default(), body)
            .map(ResponseBody::Form)
            .map_err(|e| e.to_string())
    } else {
        Ok(ResponseBody::Binary(body.clone()))
    };

    decoded.unwrap_or_else(|reason| {
        tracing::debug!(content_type = %essence, %reason, "body decode failed, falling back to text");
        ResponseBody::Text(String::from_utf8_lossy(body).into_owned())
    })
}

/// Turn a raw transport response into an envelope, or an `HttpStatus` error
/// for anything outside 200..=299.
pub fn normalize(raw: RawResponse) -> Result<ResponseEnvelope, FetchError> {
    let content_type = raw.header_values("content-type").last().map(str::to_string);
    let body = decode_body(content_type.as_deref(), &raw.body);
    let headers = normalize_headers(&raw.headers);
    let cookies = parse_set_cookies(raw.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let meta = ResponseMeta {
        url: raw.final_url,
        response_type: raw.response_type,
        redirected: raw.redirected,
    };

    if !(200..=299).contains(&raw.status) {
        let details = json!({
            "status": raw.status,
            "statusText": raw.status_text,
            "meta": meta,
            "headers": headers,
            "cookies": cookies,
            "body": body.to_json(),
        });
        let message = if raw.status_text.is_empty() {
            format!("HTTP Error {}", raw.status)
        } else {
            format!("HTTP Error {}: {}", raw.status, raw.status_text)
        };
        return Err(FetchError::HttpStatus {
            status: raw.status,
            message,
            details: Box::new(details),
        });
    }

    Ok(ResponseEnvelope {
        status: raw.status,
        body,
        headers,
        cookies,
        meta,
    })
}
