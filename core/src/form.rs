//! `multipart/form-data` response bodies.

use bytes::Bytes;
use serde::Serialize;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub value: FormValue,
}

/// Decoded form body, fields in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormData {
    pub fields: Vec<FormField>,
}

impl FormData {
    /// First text value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).and_then(|f| match &f.value {
            FormValue::Text(s) => Some(s.as_str()),
            FormValue::File(_) => None,
        })
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormField> + 'a {
        self.fields.iter().filter(move |f| f.name == name)
    }
}

impl Serialize for FormValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FormValue::Text(s) => serializer.serialize_str(s),
            FormValue::File(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("content type has no boundary parameter")]
    MissingBoundary,
    #[error("closing boundary not found")]
    Unterminated,
    #[error("part {0} has no Content-Disposition name")]
    UnnamedPart(usize),
    #[error("part {0} has no header terminator")]
    MalformedPart(usize),
}

/// Decode `body` using the boundary from `content_type`.
pub fn parse_multipart(content_type: &str, body: &[u8]) -> Result<FormData, FormError> {
    let mime: mime::Mime = content_type.parse().map_err(|_| FormError::MissingBoundary)?;
    let boundary = mime
        .get_param(mime::BOUNDARY)
        .map(|b| b.as_str().to_string())
        .ok_or(FormError::MissingBoundary)?;
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut rest = match find(body, delimiter) {
        Some(at) => &body[at + delimiter.len()..],
        None => return Err(FormError::Unterminated),
    };

    let mut fields = Vec::new();
    loop {
        if rest.starts_with(b"--") {
            return Ok(FormData { fields });
        }
        rest = strip_crlf(rest);
        let end = find(rest, delimiter).ok_or(FormError::Unterminated)?;
        let part = trim_trailing_crlf(&rest[..end]);
        fields.push(parse_part(part, fields.len())?);
        rest = &rest[end + delimiter.len()..];
    }
}

fn parse_part(part: &[u8], index: usize) -> Result<FormField, FormError> {
    let split = find(part, b"\r\n\r\n").ok_or(FormError::MalformedPart(index))?;
    let head = String::from_utf8_lossy(&part[..split]);
    let content = &part[split + 4..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;
    for line in head.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if key.trim().eq_ignore_ascii_case("content-disposition") {
            name = disposition_param(value, "name");
            filename = disposition_param(value, "filename");
        } else if key.trim().eq_ignore_ascii_case("content-type") {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or(FormError::UnnamedPart(index))?;
    let value = if filename.is_some() {
        FormValue::File(Bytes::copy_from_slice(content))
    } else {
        FormValue::Text(String::from_utf8_lossy(content).into_owned())
    };
    Ok(FormField {
        name,
        filename,
        content_type,
        value,
    })
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (k, v) = param.split_once('=')?;
        if !k.trim().eq_ignore_ascii_case(key) {
            return None;
        }
        Some(v.trim().trim_matches('"').to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn strip_crlf(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\r\n").unwrap_or(bytes)
}

fn trim_trailing_crlf(bytes: &[u8]) -> &[u8] {
    bytes.strip_suffix(b"\r\n").unwrap_or(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CT: &str = "multipart/form-data; boundary=XyZ";

    fn body() -> Vec<u8> {
        [
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "hello world\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"upload\"; filename=\"a.bin\"\r\n",
            "Content-Type: application/octet-stream\r\n\r\n",
            "\x01\x02\r\n",
            "--XyZ--\r\n",
        ]
        .concat()
        .into_bytes()
    }

    #[test]
    fn parses_text_and_file_fields() {
        let form = parse_multipart(CT, &body()).unwrap();
        assert_eq!(form.fields.len(), 2);
        assert_eq!(form.get("title"), Some("hello world"));

        let upload = form.get_all("upload").next().unwrap();
        assert_eq!(upload.filename.as_deref(), Some("a.bin"));
        assert_eq!(upload.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(upload.value, FormValue::File(Bytes::from_static(b"\x01\x02")));
    }

    #[test]
    fn missing_boundary_is_an_error() {
        let err = parse_multipart("multipart/form-data", &body()).unwrap_err();
        assert!(matches!(err, FormError::MissingBoundary));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let truncated = &body()[..30];
        assert!(parse_multipart(CT, truncated).is_err());
    }

    #[test]
    fn serializes_files_as_base64() {
        let form = parse_multipart(CT, &body()).unwrap();
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value[0]["name"], "title");
        assert_eq!(value[0]["value"], "hello world");
        assert_eq!(value[1]["value"], "AQI=");
        assert_eq!(value[1]["contentType"], "application/octet-stream");
    }
}
