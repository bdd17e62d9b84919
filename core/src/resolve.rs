//! URL resolution: endpoint path + optional base + query parameters into one
//! absolute `Url`.
//!
//! # Design
//! A path counts as relative when it starts with `/` or does not parse on its
//! own. Relative paths are joined onto the base with standard reference
//! resolution, so `"/users"` against `"https://api.test/v1"` lands on
//! `https://api.test/users`. Query parameters keep key insertion order and
//! list element order; duplicates are never collapsed.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::FetchError;

/// A single query value: a scalar or a list of scalars.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<QueryValue>),
}

impl QueryValue {
    /// Append one `(key, value)` pair per scalar to `out`.
    fn push_pairs(&self, key: &str, out: &mut Vec<(String, String)>) {
        match self {
            QueryValue::List(items) => {
                for item in items {
                    item.push_pairs(key, out);
                }
            }
            scalar => out.push((key.to_string(), scalar.to_string())),
        }
    }

    fn from_json(key: &str, value: &Value, nested: bool) -> Result<Self, FetchError> {
        Ok(match value {
            Value::String(s) => QueryValue::Str(s.clone()),
            Value::Bool(b) => QueryValue::Bool(*b),
            Value::Null => QueryValue::Str("null".to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => QueryValue::Int(i),
                None => QueryValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::Array(items) if !nested => QueryValue::List(
                items
                    .iter()
                    .map(|item| QueryValue::from_json(key, item, true))
                    .collect::<Result<_, _>>()?,
            ),
            _ => {
                return Err(FetchError::invalid_url(
                    key,
                    "query values must be scalars or lists of scalars",
                ))
            }
        })
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryValue::Str(s) => f.write_str(s),
            QueryValue::Int(i) => write!(f, "{i}"),
            QueryValue::Float(x) => write!(f, "{x}"),
            QueryValue::Bool(b) => write!(f, "{b}"),
            QueryValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}

macro_rules! query_value_from {
    ($($ty:ty => $variant:ident as $cast:ty),* $(,)?) => {
        $(impl From<$ty> for QueryValue {
            fn from(v: $ty) -> Self {
                QueryValue::$variant(v as $cast)
            }
        })*
    };
}

query_value_from!(
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Int as i64,
    f32 => Float as f64,
    f64 => Float as f64,
);

impl From<bool> for QueryValue {
    fn from(v: bool) -> Self {
        QueryValue::Bool(v)
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Str(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Str(v)
    }
}

impl<T: Into<QueryValue>> From<Vec<T>> for QueryValue {
    fn from(items: Vec<T>) -> Self {
        QueryValue::List(items.into_iter().map(Into::into).collect())
    }
}

/// Insertion-ordered query parameter mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    entries: Vec<(String, QueryValue)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`. A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten into wire pairs, one per scalar or list element.
    pub fn pairs(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            value.push_pairs(key, &mut out);
        }
        out
    }

    /// Build from a JSON object, keeping its key order.
    pub fn from_json(value: &Value) -> Result<Self, FetchError> {
        let object = value
            .as_object()
            .ok_or_else(|| FetchError::invalid_url(value.to_string(), "query parameters must be an object"))?;
        let mut params = QueryParams::new();
        for (key, value) in object {
            params.insert(key.clone(), QueryValue::from_json(key, value, false)?);
        }
        Ok(params)
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// What happens to a query string already present in the path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMerge {
    /// Injected parameters replace the existing query string.
    #[default]
    Replace,
    /// Injected parameters are appended after the existing ones.
    Append,
}

/// Turns endpoint descriptors into absolute URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UrlResolver {
    merge: QueryMerge,
}

impl UrlResolver {
    pub fn new(merge: QueryMerge) -> Self {
        Self { merge }
    }

    pub fn resolve(
        &self,
        path: &str,
        base_url: Option<&str>,
        query: Option<&QueryParams>,
    ) -> Result<Url, FetchError> {
        let mut url = match absolute(path) {
            Some(url) => url,
            None => {
                let base = base_url.ok_or_else(|| {
                    FetchError::invalid_url(path, "relative path requires a base URL")
                })?;
                let base = Url::parse(base).map_err(|e| FetchError::invalid_url(base, e))?;
                if base.cannot_be_a_base() {
                    return Err(FetchError::invalid_url(base.as_str(), "URL cannot be used as a base"));
                }
                base.join(path).map_err(|e| FetchError::invalid_url(path, e))?
            }
        };

        if let Some(query) = query {
            self.inject(&mut url, query);
        }
        Ok(url)
    }

    fn inject(&self, url: &mut Url, query: &QueryParams) {
        let pairs = query.pairs();
        match self.merge {
            QueryMerge::Replace => {
                url.set_query(None);
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs);
                }
            }
            QueryMerge::Append => {
                if !pairs.is_empty() {
                    url.query_pairs_mut().extend_pairs(pairs);
                }
            }
        }
    }
}

/// Resolve with the default (replace) query behavior.
pub fn resolve(path: &str, base_url: Option<&str>, query: Option<&QueryParams>) -> Result<Url, FetchError> {
    UrlResolver::default().resolve(path, base_url, query)
}

fn absolute(path: &str) -> Option<Url> {
    if path.starts_with('/') {
        return None;
    }
    Url::parse(path).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const BASE: &str = "https://api.example.com/v1/";

    #[test]
    fn relative_path_without_base_fails() {
        for path in ["/users", "users", "users/1?x=1"] {
            let err = resolve(path, None, None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidUrl, "{path}");
        }
    }

    #[test]
    fn relative_path_joins_onto_base() {
        let url = resolve("users/42", Some(BASE), None).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/users/42");

        let url = resolve("/health", Some(BASE), None).unwrap();
        assert_eq!(url.path(), "/health");

        let url = resolve("/a/./b/../c", Some(BASE), None).unwrap();
        assert_eq!(url.path(), "/a/c");
    }

    #[test]
    fn absolute_path_ignores_base() {
        let url = resolve("http://other.test/x", Some(BASE), None).unwrap();
        assert_eq!(url.as_str(), "http://other.test/x");
        let url = resolve("http://other.test/x", None, None).unwrap();
        assert_eq!(url.host_str(), Some("other.test"));
    }

    #[test]
    fn malformed_base_fails() {
        let err = resolve("/users", Some("not a url"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        let err = resolve("/users", Some("mailto:someone@example.com"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
    }

    #[test]
    fn query_entries_follow_insertion_and_element_order() {
        let params = QueryParams::new()
            .with("tag", vec!["a", "b"])
            .with("page", 2)
            .with("ratio", 0.5)
            .with("active", true);
        let url = resolve("/items", Some(BASE), Some(&params)).unwrap();
        assert_eq!(url.query(), Some("tag=a&tag=b&page=2&ratio=0.5&active=true"));

        let round_trip: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(round_trip, params.pairs());
    }

    #[test]
    fn whole_floats_render_without_fraction() {
        let params = QueryParams::new().with("n", 1.0);
        let url = resolve("/x", Some(BASE), Some(&params)).unwrap();
        assert_eq!(url.query(), Some("n=1"));
    }

    #[test]
    fn replace_drops_existing_query() {
        let params = QueryParams::new().with("q", "new");
        let url = resolve("/search?q=old&x=1", Some(BASE), Some(&params)).unwrap();
        assert_eq!(url.query(), Some("q=new"));
    }

    #[test]
    fn append_keeps_existing_query_and_duplicates() {
        let params = QueryParams::new().with("q", "new");
        let url = UrlResolver::new(QueryMerge::Append)
            .resolve("/search?q=old", Some(BASE), Some(&params))
            .unwrap();
        assert_eq!(url.query(), Some("q=old&q=new"));
    }

    #[test]
    fn no_query_leaves_path_query_untouched() {
        let url = resolve("/search?q=old", Some(BASE), None).unwrap();
        assert_eq!(url.query(), Some("q=old"));
    }

    #[test]
    fn reinserting_a_key_keeps_its_position() {
        let params = QueryParams::new().with("a", 1).with("b", 2).with("a", 3);
        assert_eq!(
            params.pairs(),
            vec![("a".to_string(), "3".to_string()), ("b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn query_params_from_json_object() {
        let value = serde_json::json!({"z": [1, "two"], "a": false, "n": null});
        let params = QueryParams::from_json(&value).unwrap();
        let pairs: Vec<_> = params.pairs().into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        assert_eq!(pairs, vec!["z=1", "z=two", "a=false", "n=null"]);

        assert!(QueryParams::from_json(&serde_json::json!({"a": {"b": 1}})).is_err());
        assert!(QueryParams::from_json(&serde_json::json!({"a": [[1]]})).is_err());
        assert!(QueryParams::from_json(&serde_json::json!([1])).is_err());
    }

    #[test]
    fn values_are_percent_encoded() {
        let params = QueryParams::new().with("q", "a b&c");
        let url = resolve("/s", Some(BASE), Some(&params)).unwrap();
        assert_eq!(url.query(), Some("q=a+b%26c"));
    }
}
