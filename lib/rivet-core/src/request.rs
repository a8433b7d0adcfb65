//! Host-agnostic HTTP request.
//!
//! Use [`WireRequest::builder`] to construct requests from a URL pattern,
//! path values, query values, headers and a body.
//!
//! # Example
//!
//! ```
//! use rivet_core::{Method, WireRequest};
//!
//! let request = WireRequest::builder(Method::Get, "http://api.local/items/{name}")
//!     .path("name", "foo bar")
//!     .query("page", "1")
//!     .header("Accept", "application/json")
//!     .build()
//!     .expect("all placeholders resolved");
//!
//! assert_eq!(request.url(), "http://api.local/items/foo%20bar");
//! assert_eq!(request.full_url(), "http://api.local/items/foo%20bar?page=1");
//! ```

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::{Error, Method, Result};

/// Encodes everything but unreserved characters and sub-delimiters.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// A query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// `key=value`
    Single(String),
    /// Repeated key: `key=a&key=b`
    Multi(Vec<String>),
}

impl QueryValue {
    /// Iterate over the values, in order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let values: &[String] = match self {
            Self::Single(value) => std::slice::from_ref(value),
            Self::Multi(values) => values,
        };
        values.iter().map(String::as_str)
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for QueryValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// An HTTP request ready to be dispatched.
///
/// Immutable once built, except for header merging through
/// [`WireRequest::insert_header`].
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    method: Method,
    url_pattern: String,
    url: String,
    path: BTreeMap<String, String>,
    query: BTreeMap<String, QueryValue>,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl WireRequest {
    /// Creates a new [`WireRequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url_pattern: impl Into<String>) -> WireRequestBuilder {
        WireRequestBuilder::new(method, url_pattern)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// URL pattern with `{name}` placeholders.
    #[must_use]
    pub fn url_pattern(&self) -> &str {
        &self.url_pattern
    }

    /// URL with placeholders substituted, without the query string.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// URL with the query string appended when there is one.
    #[must_use]
    pub fn full_url(&self) -> String {
        let query = self.querystring();
        if query.is_empty() {
            self.url.clone()
        } else {
            format!("{}?{query}", self.url)
        }
    }

    /// Path values.
    #[must_use]
    pub fn path_params(&self) -> &BTreeMap<String, String> {
        &self.path
    }

    /// Query values.
    #[must_use]
    pub fn query(&self) -> &BTreeMap<String, QueryValue> {
        &self.query
    }

    /// URL-encoded query string, repeated keys for multi-valued entries.
    #[must_use]
    pub fn querystring(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.query {
            for value in value.values() {
                serializer.append_pair(name, value);
            }
        }
        serializer.finish()
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name, case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any value stored under another casing.
    pub fn insert_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Request body; empty when the request has none.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Builder for constructing [`WireRequest`] instances.
#[derive(Debug, Clone)]
pub struct WireRequestBuilder {
    method: Method,
    url_pattern: String,
    path: BTreeMap<String, String>,
    query: BTreeMap<String, QueryValue>,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl WireRequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url_pattern: impl Into<String>) -> Self {
        Self {
            method,
            url_pattern: url_pattern.into(),
            path: BTreeMap::new(),
            query: BTreeMap::new(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Sets a path value.
    #[must_use]
    pub fn path(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path.insert(name.into(), value.into());
        self
    }

    /// Sets a query value.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Builds the [`WireRequest`].
    ///
    /// Fails with [`Error::MissingPathParameter`] if a placeholder of the
    /// URL pattern has no path value.
    pub fn build(self) -> Result<WireRequest> {
        let url = substitute_path(&self.url_pattern, &self.path)?;
        Ok(WireRequest {
            method: self.method,
            url_pattern: self.url_pattern,
            url,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
        })
    }
}

/// Names of the `{name}` placeholders of a pattern, in order.
#[must_use]
pub fn placeholders(pattern: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let mut rest = pattern;
    while let Some((_, after)) = rest.split_once('{') {
        let Some((name, tail)) = after.split_once('}') else {
            break;
        };
        names.push(name);
        rest = tail;
    }
    names
}

/// Substitute `{name}` placeholders with percent-encoded path values.
///
/// Substitution is total: an unresolved placeholder is an error.
pub fn substitute_path(pattern: &str, values: &BTreeMap<String, String>) -> Result<String> {
    let mut url = pattern.to_string();
    for name in placeholders(pattern) {
        let value = values
            .get(name)
            .ok_or_else(|| Error::MissingPathParameter {
                name: name.to_string(),
                pattern: pattern.to_string(),
            })?;
        let encoded = utf8_percent_encode(value, PATH_SEGMENT_ENCODE_SET).to_string();
        url = url.replace(&format!("{{{name}}}"), &encoded);
    }
    Ok(url)
}
