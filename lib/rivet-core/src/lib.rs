//! Core types for the rivet REST client.
//!
//! This crate provides the host-agnostic data model used by rivet:
//! - [`Method`] - HTTP method enum
//! - [`WireRequest`] and [`WireResponse`] - HTTP request/response containers
//! - [`Timeout`] - Request and connect timeouts
//! - [`Error`], [`HttpError`] and [`Result`] - Error handling
//! - [`RequestSchema`] and [`serialize_request`] - Location-tagged request serialization
//! - [`BodySerializers`] - Pluggable body encodings by content type
//! - [`ResponseBox`] - Lazy result wrapper
//! - [`CollectionIterator`] - Single-pass iterator over list responses
//! - [`Secret`] - Masked sensitive values

mod body;
mod collection;
mod error;
mod field;
mod method;
pub mod prelude;
mod request;
mod response;
mod response_box;
mod schema;
mod serializer;
mod timeout;

pub use body::{
    APPLICATION_JSON, BodySerializer, BodySerializers, FORM_URLENCODED, FormUrlEncodedSerializer,
    JsonSerializer, from_json, from_value, to_form, to_json,
};
pub use collection::{
    CollectionIterator, CollectionParser, DefaultCollectionParser, Metadata, TOTAL_COUNT_HEADER,
};
pub use error::{Error, HttpError, Result};
pub use field::{Field, FieldLocation, Secret};
pub use method::Method;
pub use request::{QueryValue, WireRequest, WireRequestBuilder, placeholders, substitute_path};
pub use response::{Link, ResponseBody, WireResponse, parse_links};
pub use response_box::{ErrorParser, ResponseBox};
pub use schema::{
    NoParams, Params, RequestSchema, RequestSchemaInfo, ResponseSchemaInfo, RouteKind, RouteSchema,
    TypedParams,
};
pub use serializer::serialize_request;
pub use timeout::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, Timeout};

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
