//! Header assembly: defaults, presets and per-call overrides merged into one
//! validated `HeaderSet`.
//!
//! # Design
//! The defaults live in a `HeaderAssembler` value built once from
//! configuration. `create` clones them for every call, so no call ever sees
//! another call's overlay and the stored defaults are never mutated.
//! Validation runs on the merged set and is all-or-nothing.

use std::fmt;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FetchError;

/// Ordered header collection with case-insensitive lookup and replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    entries: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name` to `value`, replacing an existing entry of the same name
    /// (any case) in place. The new spelling of the name is kept.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            Some(entry) => *entry = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.entries.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.entries.remove(idx).1)
    }

    /// Overlay every entry of `other` onto `self`; `other` wins.
    pub fn extend_from(&mut self, other: &HeaderSet) {
        for (name, value) in other.iter() {
            self.set(name, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.entries
    }

    /// Check every name against the token grammar and every value for bytes
    /// that would split the header line.
    pub fn validate(&self) -> Result<(), FetchError> {
        for (name, value) in self.iter() {
            if !is_token(name) {
                return Err(FetchError::invalid_header(
                    name,
                    "name must be a non-empty RFC 7230 token",
                ));
            }
            if value.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0)) {
                return Err(FetchError::invalid_header(name, "value contains CR, LF or NUL"));
            }
        }
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for HeaderSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = HeaderSet::new();
        for (k, v) in iter {
            set.set(k, v);
        }
        set
    }
}

impl Serialize for HeaderSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderSetVisitor;

        impl<'de> Visitor<'de> for HeaderSetVisitor {
            type Value = HeaderSet;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderSet, A::Error> {
                let mut set = HeaderSet::new();
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    set.set(k, v);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(HeaderSetVisitor)
    }
}

/// `token = 1*tchar`, tchar = ALPHA / DIGIT / ``!#$%&'*+-.^_`|~``
pub fn is_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_' | b'`' | b'|' | b'~'
                )
        })
}

/// Caller-supplied check run after the built-in validation. The `Err` string
/// becomes the reason of the resulting `InvalidHeader`.
pub type HeaderValidator = Arc<dyn Fn(&HeaderSet) -> Result<(), String> + Send + Sync>;

/// Merges the configured defaults with per-call overrides.
#[derive(Clone, Default)]
pub struct HeaderAssembler {
    defaults: HeaderSet,
    validators: Vec<HeaderValidator>,
}

impl fmt::Debug for HeaderAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderAssembler")
            .field("defaults", &self.defaults)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl HeaderAssembler {
    /// Fails if the defaults themselves break the grammar.
    pub fn new(defaults: HeaderSet) -> Result<Self, FetchError> {
        defaults.validate()?;
        Ok(Self {
            defaults,
            validators: Vec::new(),
        })
    }

    /// Register a validator. Validators run in registration order.
    pub fn add_validator<F>(&mut self, validator: F)
    where
        F: Fn(&HeaderSet) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
    }

    pub fn defaults(&self) -> &HeaderSet {
        &self.defaults
    }

    /// Clone the defaults, overlay `overrides`, validate the result.
    pub fn create(&self, overrides: Option<&HeaderSet>) -> Result<HeaderSet, FetchError> {
        let mut headers = self.defaults.clone();
        if let Some(overrides) = overrides {
            headers.extend_from(overrides);
        }
        headers.validate()?;
        for validator in &self.validators {
            if let Err(reason) = validator(&headers) {
                return Err(FetchError::invalid_header("*", reason));
            }
        }
        Ok(headers)
    }
}

/// Ready-made header sets for common request shapes.
pub mod presets {
    use super::HeaderSet;
    use crate::error::FetchError;

    pub fn json() -> HeaderSet {
        HeaderSet::new()
            .with("Content-Type", "application/json")
            .with("Accept", "application/json")
    }

    /// The boundary parameter is left for the transport to fill in.
    pub fn form_data() -> HeaderSet {
        HeaderSet::new().with("Content-Type", "multipart/form-data")
    }

    pub fn bearer_token(token: &str) -> Result<HeaderSet, FetchError> {
        if token.trim().is_empty() {
            return Err(FetchError::invalid_header(
                "Authorization",
                "bearer token must not be empty",
            ));
        }
        Ok(HeaderSet::new().with("Authorization", format!("Bearer {token}")))
    }
}
