//! Body serialization utilities.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// `application/json`
pub const APPLICATION_JSON: &str = "application/json";

/// `application/x-www-form-urlencoded`
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Encodes the body fields of a request for a content type.
pub trait BodySerializer: Send + Sync + 'static {
    /// Returns `true` if this serializer handles the content type.
    fn accepts(&self, content_type: &str) -> bool;

    /// Encode the body fields.
    fn serialize(&self, fields: &Map<String, Value>) -> Result<Bytes>;
}

/// Media type without parameters, e.g. `application/json; charset=utf-8`
/// gives `application/json`.
fn media_type(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map_or(content_type, str::trim)
}

/// Serializes the body fields as one JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl BodySerializer for JsonSerializer {
    fn accepts(&self, content_type: &str) -> bool {
        let media_type = media_type(content_type);
        media_type.eq_ignore_ascii_case(APPLICATION_JSON)
            || media_type.to_ascii_lowercase().ends_with("+json")
    }

    fn serialize(&self, fields: &Map<String, Value>) -> Result<Bytes> {
        to_json(fields)
    }
}

/// Serializes the body fields as `application/x-www-form-urlencoded`.
///
/// Arrays become repeated keys, null fields are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormUrlEncodedSerializer;

impl BodySerializer for FormUrlEncodedSerializer {
    fn accepts(&self, content_type: &str) -> bool {
        media_type(content_type).eq_ignore_ascii_case(FORM_URLENCODED)
    }

    fn serialize(&self, fields: &Map<String, Value>) -> Result<Bytes> {
        let mut pairs = Vec::with_capacity(fields.len());
        for (name, value) in fields {
            match value {
                Value::Null => {}
                Value::Array(values) => pairs.extend(
                    values
                        .iter()
                        .filter(|value| !value.is_null())
                        .map(|value| (name.as_str(), coerce_to_string(value))),
                ),
                value => pairs.push((name.as_str(), coerce_to_string(value))),
            }
        }
        to_form(&pairs)
    }
}

/// String form of a JSON value: strings unquoted, anything else as JSON text.
pub(crate) fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(value) => value.clone(),
        other => other.to_string(),
    }
}

/// Registry of body serializers, consulted most-recently-registered first.
#[derive(Clone)]
pub struct BodySerializers {
    serializers: Vec<Arc<dyn BodySerializer>>,
}

impl BodySerializers {
    /// An empty registry.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            serializers: Vec::new(),
        }
    }

    /// Register a serializer; it takes precedence over earlier ones.
    pub fn register(&mut self, serializer: impl BodySerializer) {
        self.serializers.push(Arc::new(serializer));
    }

    /// Builder-style [`BodySerializers::register`].
    #[must_use]
    pub fn with(mut self, serializer: impl BodySerializer) -> Self {
        self.register(serializer);
        self
    }

    /// The first serializer accepting the content type.
    pub fn find(&self, content_type: &str) -> Result<&dyn BodySerializer> {
        self.serializers
            .iter()
            .rev()
            .find(|serializer| serializer.accepts(content_type))
            .map(AsRef::as_ref)
            .ok_or_else(|| Error::UnregisteredContentType(content_type.to_string()))
    }

    /// Encode body fields for a content type.
    pub fn serialize(&self, content_type: &str, fields: &Map<String, Value>) -> Result<Bytes> {
        self.find(content_type)?.serialize(fields)
    }
}

impl Default for BodySerializers {
    /// JSON and form URL-encoded.
    fn default() -> Self {
        Self::empty()
            .with(JsonSerializer)
            .with(FormUrlEncodedSerializer)
    }
}

impl fmt::Debug for BodySerializers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodySerializers")
            .field("len", &self.serializers.len())
            .finish()
    }
}

/// Serialize a value to JSON bytes.
///
/// # Example
///
/// ```
/// use rivet_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to form URL-encoded bytes.
///
/// Uses `serde_html_form` which supports sequences for repeated form fields
/// (e.g., `tags=a&tags=b&tags=c`).
pub fn to_form<T: serde::Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    serde_html_form::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Deserialize JSON bytes with path-aware error messages.
///
/// Failures are reported as [`Error::SchemaValidation`] with the path to the
/// offending field (e.g. `items[0].name`).
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| Error::schema_validation(e.path().to_string(), e.inner().to_string()))
}

/// Deserialize a JSON value with path-aware error messages.
pub fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value)
        .map_err(|e| Error::schema_validation(e.path().to_string(), e.inner().to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn json_serializer_accepts() {
        assert!(JsonSerializer.accepts("application/json"));
        assert!(JsonSerializer.accepts("Application/JSON; charset=utf-8"));
        assert!(JsonSerializer.accepts("application/problem+json"));
        assert!(!JsonSerializer.accepts("text/plain"));
    }

    #[test]
    fn json_serializer_encodes_object() {
        let bytes = JsonSerializer
            .serialize(&fields(json!({"name": "Alice", "age": 30})))
            .expect("serialize");
        let decoded: Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(decoded, json!({"name": "Alice", "age": 30}));
    }

    #[test]
    fn form_serializer_repeats_arrays_and_skips_nulls() {
        let bytes = FormUrlEncodedSerializer
            .serialize(&fields(json!({"tags": ["a", "b"], "user": "alice", "none": null})))
            .expect("serialize");
        assert_eq!(bytes.as_ref(), b"tags=a&tags=b&user=alice");
    }

    #[test]
    fn registry_prefers_most_recent() {
        struct Upper;
        impl BodySerializer for Upper {
            fn accepts(&self, content_type: &str) -> bool {
                content_type == APPLICATION_JSON
            }
            fn serialize(&self, _fields: &Map<String, Value>) -> Result<Bytes> {
                Ok(Bytes::from_static(b"UPPER"))
            }
        }

        let registry = BodySerializers::default().with(Upper);
        let bytes = registry
            .serialize(APPLICATION_JSON, &Map::new())
            .expect("serialize");
        assert_eq!(bytes.as_ref(), b"UPPER");
    }

    #[test]
    fn registry_unknown_content_type() {
        let err = BodySerializers::default()
            .serialize("application/xml", &Map::new())
            .expect_err("no serializer");
        assert!(matches!(err, Error::UnregisteredContentType(ref ct) if ct == "application/xml"));
    }

    #[test]
    fn from_json_reports_path() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Item {
            name: String,
        }
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Page {
            items: Vec<Item>,
        }

        let err = from_json::<Page>(br#"{"items":[{"name":1}]}"#).expect_err("invalid");
        match err {
            Error::SchemaValidation { path, .. } => assert_eq!(path, "items[0].name"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
