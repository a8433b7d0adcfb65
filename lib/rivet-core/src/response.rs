//! Host-agnostic HTTP response.
//!
//! [`WireResponse`] holds the status, the headers and a body that is either
//! parsed JSON or raw bytes, plus the RFC 5988 links of its `Link` header.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use serde_json::Value;

/// Response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// JSON document; an empty body is `Null`.
    Json(Value),
    /// Body that is not valid JSON.
    Raw(Bytes),
}

/// One entry of a `Link` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Target URL.
    pub url: String,
    /// Link parameters (`rel`, `title`, ...), quotes removed.
    pub params: BTreeMap<String, String>,
}

impl Link {
    /// The `rel` parameter, if any.
    #[must_use]
    pub fn rel(&self) -> Option<&str> {
        self.params.get("rel").map(String::as_str)
    }
}

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq)]
pub struct WireResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: ResponseBody,
}

impl WireResponse {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Creates a response with a JSON payload.
    #[must_use]
    pub fn json_response(status: u16, headers: HashMap<String, String>, json: Value) -> Self {
        Self::new(status, headers, ResponseBody::Json(json))
    }

    /// Creates a response from raw body bytes.
    ///
    /// Empty bodies (e.g. `204 No Content`) become JSON `null`, bodies that
    /// are not JSON are kept raw.
    #[must_use]
    pub fn from_bytes(status: u16, headers: HashMap<String, String>, body: &[u8]) -> Self {
        let body = if body.is_empty() {
            ResponseBody::Json(Value::Null)
        } else {
            serde_json::from_slice(body).map_or_else(
                |_| ResponseBody::Raw(Bytes::copy_from_slice(body)),
                ResponseBody::Json,
            )
        };
        Self::new(status, headers, body)
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
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

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &ResponseBody {
        &self.body
    }

    /// JSON payload, if the body is JSON.
    #[must_use]
    pub const fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Links of the `Link` header, keyed by `rel` (or by URL without `rel`).
    #[must_use]
    pub fn links(&self) -> BTreeMap<String, Link> {
        self.header("Link").map(parse_links).unwrap_or_default()
    }
}

/// Parse an RFC 5988 `Link` header value.
#[must_use]
pub fn parse_links(value: &str) -> BTreeMap<String, Link> {
    let mut links = BTreeMap::new();
    for entry in split_entries(value) {
        let mut parts = entry.split(';');
        let Some(target) = parts.next() else {
            continue;
        };
        let url = target.trim().trim_start_matches('<').trim_end_matches('>');
        if url.is_empty() {
            continue;
        }
        let params: BTreeMap<String, String> = parts
            .filter_map(|param| param.split_once('='))
            .map(|(key, value)| {
                (
                    key.trim().to_string(),
                    value.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
                )
            })
            .collect();
        let key = params.get("rel").cloned().unwrap_or_else(|| url.to_string());
        links.insert(
            key,
            Link {
                url: url.to_string(),
                params,
            },
        );
    }
    links
}

/// Split on commas that start a new `<url>` entry; URLs may contain commas.
fn split_entries(value: &str) -> Vec<&str> {
    let mut entries = Vec::new();
    let mut start = 0;
    for (idx, _) in value.match_indices(',') {
        let starts_entry = value
            .get(idx + 1..)
            .is_some_and(|rest| rest.trim_start().starts_with('<'));
        if starts_entry {
            if let Some(entry) = value.get(start..idx) {
                entries.push(entry);
            }
            start = idx + 1;
        }
    }
    if let Some(entry) = value.get(start..) {
        entries.push(entry);
    }
    entries
}
