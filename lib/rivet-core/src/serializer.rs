//! Serialization of typed request objects into [`WireRequest`]s.

use serde_json::{Map, Value};

use crate::body::coerce_to_string;
use crate::{
    APPLICATION_JSON, BodySerializers, Error, FieldLocation, Method, QueryValue, RequestSchema,
    Result, WireRequest,
};

const CONTENT_TYPE: &str = "Content-Type";

/// Build a [`WireRequest`] from a request object.
///
/// Fields are partitioned by location:
/// - path values are substituted into the URL pattern and may not be null,
/// - header and query values are coerced to strings, nulls are omitted,
///   arrays become repeated query keys,
/// - body fields are encoded by the serializer registered for the content
///   type (`application/json` unless a `Content-Type` header field says
///   otherwise); no body field means an empty body.
pub fn serialize_request(
    method: Method,
    url_pattern: &str,
    request: &dyn RequestSchema,
    serializers: &BodySerializers,
) -> Result<WireRequest> {
    let mut builder = WireRequest::builder(method, url_pattern);
    let mut body = Map::new();
    let mut content_type = None;

    for field in request.fields()? {
        match field.location {
            FieldLocation::Path => {
                if field.value.is_null() {
                    return Err(Error::MissingPathParameter {
                        name: field.name,
                        pattern: url_pattern.to_string(),
                    });
                }
                builder = builder.path(field.name, coerce_to_string(&field.value));
            }
            FieldLocation::Header => {
                if field.value.is_null() {
                    continue;
                }
                let value = coerce_to_string(&field.value);
                if field.name.eq_ignore_ascii_case(CONTENT_TYPE) {
                    content_type = Some(value.clone());
                }
                builder = builder.header(field.name, value);
            }
            FieldLocation::Query => match field.value {
                Value::Null => {}
                Value::Array(values) => {
                    let values = values
                        .iter()
                        .filter(|value| !value.is_null())
                        .map(coerce_to_string)
                        .collect::<Vec<_>>();
                    builder = builder.query(field.name, QueryValue::Multi(values));
                }
                value => {
                    builder = builder.query(field.name, coerce_to_string(&value));
                }
            },
            FieldLocation::Body => {
                body.insert(field.name, field.value);
            }
        }
    }

    if !body.is_empty() {
        if content_type.is_none() {
            builder = builder.header(CONTENT_TYPE, APPLICATION_JSON);
        }
        let content_type = content_type.as_deref().unwrap_or(APPLICATION_JSON);
        let bytes = serializers.serialize(content_type, &body)?;
        builder = builder.body(bytes);
    }

    builder.build()
}
