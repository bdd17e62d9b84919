//! Structured `Set-Cookie` parsing.
//!
//! Cookies are parsed fresh from every response and never stored here.
//! Parsing is lenient: an attribute that cannot be understood is skipped or
//! recorded as invalid, it never aborts the rest of the header.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use percent_encoding::percent_decode_str;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Largest representable date, in milliseconds either side of the epoch.
const MAX_DATE_MILLIS: i64 = 8_640_000_000_000_000;

/// Expiry of a cookie. `Invalid` records a date or max-age that did not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    At(SystemTime),
    Invalid,
}

impl Expiry {
    /// Milliseconds since the Unix epoch, negative before it. `None` for
    /// `Invalid` and for instants beyond ±8.64e15 ms.
    pub fn epoch_millis(&self) -> Option<i64> {
        let Expiry::At(at) = self else {
            return None;
        };
        let millis = match at.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).ok()?,
            Err(before) => -i64::try_from(before.duration().as_millis()).ok()?,
        };
        (millis.abs() <= MAX_DATE_MILLIS).then_some(millis)
    }

    fn after_seconds(now: SystemTime, seconds: i64) -> Expiry {
        let offset = Duration::from_millis(seconds.unsigned_abs().saturating_mul(1000));
        let at = if seconds >= 0 {
            now.checked_add(offset)
        } else {
            now.checked_sub(offset)
        };
        match at.map(Expiry::At) {
            Some(expiry) if expiry.epoch_millis().is_some() => expiry,
            _ => Expiry::Invalid,
        }
    }
}

impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.epoch_millis() {
            Some(ms) => serializer.serialize_i64(ms),
            None => serializer.serialize_str("Invalid Date"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<Expiry>,
    pub secure: Option<bool>,
    pub http_only: Option<bool>,
    /// Recorded verbatim; `Strict`, `Lax` and `None` are expected but not
    /// enforced.
    pub same_site: Option<String>,
}

impl Serialize for Cookie {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Cookie", 8)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("value", &self.value)?;
        if let Some(domain) = &self.domain {
            s.serialize_field("domain", domain)?;
        }
        if let Some(path) = &self.path {
            s.serialize_field("path", path)?;
        }
        if let Some(expires) = &self.expires {
            s.serialize_field("expires", expires)?;
        }
        if let Some(secure) = self.secure {
            s.serialize_field("secure", &secure)?;
        }
        if let Some(http_only) = self.http_only {
            s.serialize_field("httpOnly", &http_only)?;
        }
        if let Some(same_site) = &self.same_site {
            s.serialize_field("sameSite", same_site)?;
        }
        s.end()
    }
}

/// Parse every cookie in a (possibly comma-joined) `Set-Cookie` value.
pub fn parse_set_cookie(header: &str) -> Vec<Cookie> {
    parse_set_cookie_at(header, SystemTime::now())
}

/// Parse the `set-cookie` entries of a header list. Multiple entries are
/// joined with `", "` first, the same way a fetch `Headers.get` reports them.
pub fn parse_set_cookies<'a, I>(headers: I) -> Vec<Cookie>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let values: Vec<&str> = headers
        .into_iter()
        .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
        .map(|(_, value)| value)
        .collect();
    if values.is_empty() {
        return Vec::new();
    }
    parse_set_cookie(&values.join(", "))
}

pub(crate) fn parse_set_cookie_at(header: &str, now: SystemTime) -> Vec<Cookie> {
    split_cookies(header)
        .into_iter()
        .filter_map(|segment| parse_one(segment, now))
        .collect()
}

/// Split on commas that separate cookies, leaving the comma of an
/// `Expires=Wed, 09 Jun 2021 ...` date alone.
fn split_cookies(header: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (idx, ch) in header.char_indices() {
        if ch != ',' {
            continue;
        }
        let current = &header[start..idx];
        let attr = current.rsplit(';').next().unwrap_or("").trim_start();
        if in_expires_weekday(attr) {
            continue;
        }
        segments.push(current);
        start = idx + 1;
    }
    segments.push(&header[start..]);
    segments
}

/// True while `attr` is `Expires=` followed by nothing but a weekday name,
/// i.e. the comma just reached belongs to an RFC 1123 date.
fn in_expires_weekday(attr: &str) -> bool {
    let Some((key, value)) = attr.split_once('=') else {
        return false;
    };
    let value = value.trim();
    key.trim().eq_ignore_ascii_case("expires")
        && !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_alphabetic())
}

fn parse_one(segment: &str, now: SystemTime) -> Option<Cookie> {
    let mut pieces = segment.split(';').map(str::trim);
    let pair = pieces.next().filter(|p| !p.is_empty())?;
    let (name, value) = pair.split_once('=').unwrap_or((pair, ""));

    let mut cookie = Cookie {
        name: decode(name.trim()),
        value: decode(value.trim()),
        ..Cookie::default()
    };
    let mut max_age = None;

    for piece in pieces.filter(|p| !p.is_empty()) {
        let (key, value) = match piece.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim()),
            None => (piece.to_ascii_lowercase(), ""),
        };
        match key.as_str() {
            "domain" => cookie.domain = Some(value.to_string()),
            "path" => cookie.path = Some(value.to_string()),
            "expires" => {
                cookie.expires = Some(match httpdate::parse_http_date(value) {
                    Ok(at) => Expiry::At(at),
                    Err(_) => Expiry::Invalid,
                })
            }
            "max-age" => {
                max_age = Some(match value.parse::<i64>() {
                    Ok(seconds) => Expiry::after_seconds(now, seconds),
                    Err(_) => Expiry::Invalid,
                })
            }
            "secure" => cookie.secure = Some(true),
            "httponly" => cookie.http_only = Some(true),
            "samesite" => cookie.same_site = Some(value.to_string()),
            other => tracing::debug!(attribute = other, cookie = %cookie.name, "ignoring cookie attribute"),
        }
    }

    // Max-Age wins over Expires no matter which came first.
    if max_age.is_some() {
        cookie.expires = max_age;
    }
    Some(cookie)
}

fn decode(raw: &str) -> String {
    percent_decode_str(raw).decode_utf8_lossy().into_owned()
}
