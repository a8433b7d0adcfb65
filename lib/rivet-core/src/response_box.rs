//! Lazy, error-aware result of a verb call.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Error, HttpError, Method, ResponseBody, ResponseSchemaInfo, Result, WireResponse};

/// Converts an [`HttpError`] into a domain error.
pub struct ErrorParser<E>(Arc<dyn Fn(HttpError) -> E + Send + Sync>);

impl<E> ErrorParser<E> {
    /// Wrap a conversion function.
    pub fn new(parse: impl Fn(HttpError) -> E + Send + Sync + 'static) -> Self {
        Self(Arc::new(parse))
    }

    /// Convert an HTTP error.
    pub fn parse(&self, error: HttpError) -> E {
        (self.0)(error)
    }
}

impl<E> Clone for ErrorParser<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Default for ErrorParser<HttpError> {
    /// Identity: the domain error is the HTTP error itself.
    fn default() -> Self {
        Self::new(|error| error)
    }
}

impl<E> fmt::Debug for ErrorParser<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ErrorParser")
    }
}

/// Result-like wrapper binding a raw HTTP outcome to a success type `T` and
/// an error type `E`.
///
/// Nothing is parsed until a consuming accessor runs, and every accessor
/// consumes the box, so the payload is parsed at most once. Parse failures
/// are reported as [`Error::SchemaValidation`], never as [`Error::Http`].
///
/// The combinators follow the `Result` laws over the parsed values:
/// `map(|x| x)` yields what `unwrap()` yields on success, and
/// `map_err(|e| e)` yields what `unwrap_err()` yields on failure.
///
/// # Example
///
/// ```ignore
/// let item: Item = proxy.get::<Item>(ItemParams { item_name: "foo".into() })
///     .await?
///     .unwrap()?;
/// ```
pub struct ResponseBox<T, E = HttpError> {
    outcome: std::result::Result<WireResponse, HttpError>,
    schema: Option<ResponseSchemaInfo>,
    method: Method,
    path: String,
    error_parser: ErrorParser<E>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, E> ResponseBox<T, E> {
    /// Wrap the outcome of a call.
    ///
    /// `method` and `path` identify the route in error messages.
    #[must_use]
    pub fn new(
        outcome: std::result::Result<WireResponse, HttpError>,
        schema: Option<ResponseSchemaInfo>,
        method: Method,
        path: impl Into<String>,
        error_parser: ErrorParser<E>,
    ) -> Self {
        Self {
            outcome,
            schema,
            method,
            path: path.into(),
            error_parser,
            _marker: PhantomData,
        }
    }

    /// Returns `true` for a 2xx outcome.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns `true` for an HTTP error outcome.
    #[must_use]
    pub const fn is_err(&self) -> bool {
        self.outcome.is_err()
    }

    /// The raw success response.
    #[must_use]
    pub fn response(&self) -> Option<&WireResponse> {
        self.outcome.as_ref().ok()
    }

    /// The raw HTTP error.
    #[must_use]
    pub fn http_error(&self) -> Option<&HttpError> {
        self.outcome.as_ref().err()
    }

    /// The unparsed JSON payload of the success response.
    #[must_use]
    pub fn json(&self) -> Option<&Value> {
        self.response().and_then(WireResponse::json)
    }

    /// The error through the [`ErrorParser`].
    ///
    /// # Panics
    ///
    /// Panics if the call succeeded.
    pub fn unwrap_err(self) -> E {
        match self.outcome {
            Ok(_) => panic!(
                "called `ResponseBox::unwrap_err()` on a success response of {} {}",
                self.method, self.path
            ),
            Err(error) => self.error_parser.parse(error),
        }
    }

    /// Like [`ResponseBox::unwrap_err`], panicking with `msg` on success.
    ///
    /// # Panics
    ///
    /// Panics with `msg` if the call succeeded.
    pub fn expect_err(self, msg: &str) -> E {
        match self.outcome {
            Ok(_) => panic!("{msg}"),
            Err(error) => self.error_parser.parse(error),
        }
    }
}

impl<T: DeserializeOwned + 'static, E> ResponseBox<T, E> {
    fn parse(
        schema: Option<ResponseSchemaInfo>,
        method: Method,
        path: String,
        response: WireResponse,
    ) -> Result<T> {
        let schema = schema.ok_or(Error::NoResponseSchema { method, path })?;
        match response.body() {
            ResponseBody::Json(value) => schema.parse(value.clone()),
            ResponseBody::Raw(_) => Err(Error::schema_validation(
                "",
                format!("response of {method} is not JSON"),
            )),
        }
    }

    /// Both variants, parsed.
    ///
    /// The outer `Result` carries schema and configuration failures, the
    /// inner one the call outcome.
    pub fn into_result(self) -> Result<std::result::Result<T, E>> {
        match self.outcome {
            Ok(response) => Self::parse(self.schema, self.method, self.path, response).map(Ok),
            Err(error) => Ok(Err(self.error_parser.parse(error))),
        }
    }

    /// The parsed success value.
    ///
    /// An HTTP error is returned as [`Error::Http`].
    pub fn unwrap(self) -> Result<T> {
        match self.outcome {
            Ok(response) => Self::parse(self.schema, self.method, self.path, response),
            Err(error) => Err(error.into()),
        }
    }

    /// The parsed success value, or `default` on HTTP error.
    pub fn unwrap_or(self, default: T) -> Result<T> {
        self.unwrap_or_else(|_| default)
    }

    /// The parsed success value, or `op(error)` on HTTP error.
    pub fn unwrap_or_else(self, op: impl FnOnce(E) -> T) -> Result<T> {
        Ok(self.into_result()?.unwrap_or_else(op))
    }

    /// Like [`ResponseBox::unwrap`], panicking with `msg` on HTTP error.
    ///
    /// # Panics
    ///
    /// Panics with `msg` if the call failed.
    pub fn expect(self, msg: &str) -> Result<T> {
        match self.outcome {
            Ok(response) => Self::parse(self.schema, self.method, self.path, response),
            Err(error) => panic!("{msg}: {error}"),
        }
    }

    /// Map the parsed success value.
    pub fn map<U>(self, op: impl FnOnce(T) -> U) -> Result<std::result::Result<U, E>> {
        Ok(self.into_result()?.map(op))
    }

    /// Map the parsed error value.
    pub fn map_err<F>(self, op: impl FnOnce(E) -> F) -> Result<std::result::Result<T, F>> {
        Ok(self.into_result()?.map_err(op))
    }

    /// Chain a fallible operation on the parsed success value.
    pub fn and_then<U>(
        self,
        op: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> Result<std::result::Result<U, E>> {
        Ok(self.into_result()?.and_then(op))
    }

    /// Recover from the parsed error value.
    pub fn or_else<F>(
        self,
        op: impl FnOnce(E) -> std::result::Result<T, F>,
    ) -> Result<std::result::Result<T, F>> {
        Ok(self.into_result()?.or_else(op))
    }
}

impl<T, E> Clone for ResponseBox<T, E> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            schema: self.schema,
            method: self.method,
            path: self.path.clone(),
            error_parser: self.error_parser.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, E> fmt::Debug for ResponseBox<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBox")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("outcome", &self.outcome)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::WireRequest;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct Item {
        name: String,
    }

    #[derive(Debug, PartialEq)]
    struct ApiError {
        status: Option<u16>,
    }

    fn api_error_parser() -> ErrorParser<ApiError> {
        ErrorParser::new(|error: HttpError| ApiError {
            status: error.status(),
        })
    }

    fn success(body: &[u8]) -> ResponseBox<Item, ApiError> {
        ResponseBox::new(
            Ok(WireResponse::from_bytes(200, HashMap::new(), body)),
            Some(ResponseSchemaInfo::of::<Item>()),
            Method::Get,
            "/items/{item_name}",
            api_error_parser(),
        )
    }

    fn failure(status: u16) -> ResponseBox<Item, ApiError> {
        let request = WireRequest::builder(Method::Get, "/items/foo")
            .build()
            .expect("request");
        let response = WireResponse::from_bytes(status, HashMap::new(), b"");
        ResponseBox::new(
            Err(HttpError::new(request, Some(response))),
            Some(ResponseSchemaInfo::of::<Item>()),
            Method::Get,
            "/items/{item_name}",
            api_error_parser(),
        )
    }

    fn foo() -> Item {
        Item { name: "foo".into() }
    }

    fn bar() -> Item {
        Item { name: "bar".into() }
    }

    #[test]
    fn success_box_laws() {
        let boxed = success(br#"{"name":"foo"}"#);
        assert!(boxed.is_ok());
        assert!(!boxed.is_err());

        let unwrapped = boxed.clone().unwrap().expect("parse");
        assert_eq!(unwrapped, foo());
        assert_eq!(boxed.clone().map(|item| item).expect("parse"), Ok(foo()));
        assert_eq!(boxed.clone().unwrap_or(bar()).expect("parse"), unwrapped);
        assert_eq!(boxed.clone().unwrap_or_else(|_| bar()).expect("parse"), unwrapped);
        assert_eq!(
            boxed.clone().and_then(|item| Ok(item.name)).expect("parse"),
            Ok("foo".to_string())
        );
        assert_eq!(boxed.expect("should succeed").expect("parse"), foo());
    }

    #[test]
    fn error_box_laws() {
        let boxed = failure(404);
        assert!(boxed.is_err());

        let err = boxed.clone().unwrap_err();
        assert_eq!(err, ApiError { status: Some(404) });
        assert_eq!(boxed.clone().map_err(|e| e).expect("no parse"), Err(err));
        assert_eq!(boxed.clone().unwrap_or(bar()).expect("default"), bar());
        assert_eq!(
            boxed.clone().or_else(|e| Err::<Item, _>(e.status)).expect("no parse"),
            Err(Some(404))
        );
        assert_eq!(boxed.clone().map(|item| item.name).expect("no parse"), Err(ApiError {
            status: Some(404)
        }));

        let unwrapped = boxed.unwrap().expect_err("http error");
        assert_eq!(unwrapped.status(), Some(404));
    }

    #[test]
    fn malformed_payload_is_schema_error() {
        let err = success(br#"{"title":"foo"}"#).unwrap().expect_err("invalid");
        assert!(matches!(err, Error::SchemaValidation { .. }));

        let err = success(b"not json").unwrap().expect_err("raw body");
        assert!(matches!(err, Error::SchemaValidation { .. }));
    }

    #[test]
    fn missing_response_schema() {
        let boxed: ResponseBox<Item> = ResponseBox::new(
            Ok(WireResponse::from_bytes(204, HashMap::new(), b"")),
            None,
            Method::Delete,
            "/items/{item_name}",
            ErrorParser::default(),
        );
        let err = boxed.unwrap().expect_err("no schema");
        assert!(matches!(err, Error::NoResponseSchema { method: Method::Delete, .. }));
    }

    #[test]
    fn raw_json_access() {
        let boxed = success(br#"{"name":"foo","extra":1}"#);
        assert_eq!(boxed.json(), Some(&json!({"name": "foo", "extra": 1})));

        let boxed: ResponseBox<Value, ApiError> = ResponseBox::new(
            Ok(WireResponse::from_bytes(200, HashMap::new(), br#"{"name":"foo"}"#)),
            Some(ResponseSchemaInfo::of::<Item>()),
            Method::Get,
            "/items/{item_name}",
            api_error_parser(),
        );
        assert_eq!(boxed.unwrap().expect("raw"), json!({"name": "foo"}));
    }

    #[test]
    #[should_panic(expected = "item lookup")]
    fn expect_panics_with_message() {
        let _ = failure(500).expect("item lookup");
    }

    #[test]
    #[should_panic(expected = "should fail")]
    fn expect_err_panics_with_message() {
        let _ = success(br#"{"name":"foo"}"#).expect_err("should fail");
    }
}
