//! Error types for rivet.

use std::fmt;

use derive_more::{Display, Error, From};

use crate::{Method, RouteKind, WireRequest, WireResponse};

// ============================================================================
// HTTP Error
// ============================================================================

/// A non-2xx outcome, carrying the request that triggered it.
///
/// The response is absent when the transport failed before a status line
/// was received.
#[derive(Debug, Clone)]
pub struct HttpError {
    request: WireRequest,
    response: Option<WireResponse>,
}

impl HttpError {
    /// Create an HTTP error from the triggering request and its response.
    #[must_use]
    pub fn new(request: WireRequest, response: Option<WireResponse>) -> Self {
        Self { request, response }
    }

    /// The request that triggered the error.
    #[must_use]
    pub fn request(&self) -> &WireRequest {
        &self.request
    }

    /// The response, if one was received.
    #[must_use]
    pub fn response(&self) -> Option<&WireResponse> {
        self.response.as_ref()
    }

    /// The HTTP status code, if a response was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(WireResponse::status)
    }

    /// The JSON payload of the error response, if any.
    #[must_use]
    pub fn json(&self) -> Option<&serde_json::Value> {
        self.response.as_ref().and_then(WireResponse::json)
    }

    /// Returns `true` for 4xx responses.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` for 5xx responses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(status) => write!(
                f,
                "HTTP error {status} on {} {}",
                self.request.method(),
                self.request.url()
            ),
            None => write!(
                f,
                "HTTP error on {} {}",
                self.request.method(),
                self.request.url()
            ),
        }
    }
}

impl std::error::Error for HttpError {}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for rivet operations.
///
/// Configuration errors are raised before any network activity and are never
/// retried. [`Error::Http`] and [`Error::CircuitOpen`] are distinct so callers
/// can branch on them.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// No client registered under this name.
    #[display("unregistered client '{_0}'")]
    #[from(skip)]
    UnregisteredClient(#[error(not(source))] String),

    /// The client has no resource registered under this name.
    #[display("unregistered resource '{resource}' on client '{client}'")]
    #[from(skip)]
    UnregisteredResource {
        /// Client name.
        client: String,
        /// Resource name.
        resource: String,
    },

    /// The resource or collection route was not registered.
    #[display("unregistered {kind} route for '{client}.{resource}'")]
    #[from(skip)]
    UnregisteredRoute {
        /// Client name.
        client: String,
        /// Resource name.
        resource: String,
        /// Which route was requested.
        kind: RouteKind,
    },

    /// The route exists but declares no contract for the method.
    #[display("no contract for {method} {path}")]
    #[from(skip)]
    NoContract {
        /// Requested method.
        method: Method,
        /// Route path template.
        path: String,
    },

    /// Typed parameters do not match the route's request schema.
    #[display("wrong request type: expected {expected}, got {actual}")]
    #[from(skip)]
    WrongRequestType {
        /// Declared request schema.
        expected: &'static str,
        /// Supplied parameter type.
        actual: &'static str,
    },

    /// The requested response type does not match the route's response schema.
    #[display("wrong response type: expected {expected}, got {actual}")]
    #[from(skip)]
    WrongResponseType {
        /// Declared response schema.
        expected: &'static str,
        /// Requested type.
        actual: &'static str,
    },

    /// The route declares no response schema.
    #[display("no response schema for {method} {path}")]
    #[from(skip)]
    NoResponseSchema {
        /// Requested method.
        method: Method,
        /// Route path template.
        path: String,
    },

    /// No body serializer accepts the content type.
    #[display("unregistered content type '{_0}'")]
    #[from(skip)]
    UnregisteredContentType(#[error(not(source))] String),

    /// Service discovery does not know the service.
    #[display("unregistered service '{_0}'")]
    #[from(skip)]
    UnregisteredService(#[error(not(source))] String),

    /// A `{name}` placeholder of the URL pattern has no value.
    #[display("missing path parameter '{name}' for '{pattern}'")]
    #[from(skip)]
    MissingPathParameter {
        /// Placeholder name.
        name: String,
        /// URL pattern.
        pattern: String,
    },

    /// Inconsistent registration or factory setup.
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// Non-2xx response.
    #[display("{_0}")]
    #[from(skip)]
    Http(Box<HttpError>),

    /// Connect or read timeout.
    #[display("request to {url} timed out after {}ms", timeout.as_millis())]
    #[from(skip)]
    Timeout {
        /// Target URL.
        url: String,
        /// The timeout that elapsed.
        timeout: std::time::Duration,
    },

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// The circuit breaker of this client is open.
    #[display("circuit breaker open for client '{client_name}'")]
    #[from(skip)]
    CircuitOpen {
        /// Client whose breaker rejected the call.
        client_name: String,
    },

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// A payload does not match its declared schema.
    #[display("schema validation error at '{path}': {message}")]
    #[from(skip)]
    SchemaValidation {
        /// JSON path to the error (e.g., "items[0].name").
        path: String,
        /// Error message.
        message: String,
    },

    /// The cache store failed.
    #[display("cache store error: {_0}")]
    #[from(skip)]
    CacheStore(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<HttpError> for Error {
    fn from(error: HttpError) -> Self {
        Self::Http(Box::new(error))
    }
}

impl Error {
    /// Create an unregistered service error.
    #[must_use]
    pub fn unregistered_service(service: &str, version: Option<&str>) -> Self {
        match version {
            Some(version) => Self::UnregisteredService(format!("{service}/{version}")),
            None => Self::UnregisteredService(service.to_string()),
        }
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a schema validation error with path context.
    #[must_use]
    pub fn schema_validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaValidation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a cache store error.
    #[must_use]
    pub fn cache_store(message: impl Into<String>) -> Self {
        Self::CacheStore(message.into())
    }

    /// Returns the HTTP error if this is one.
    #[must_use]
    pub fn as_http(&self) -> Option<&HttpError> {
        match self {
            Self::Http(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is an HTTP error with a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.as_http().and_then(HttpError::status)
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.as_http().is_some_and(HttpError::is_client_error)
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.as_http().is_some_and(HttpError::is_server_error)
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if a circuit breaker rejected the call.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Returns `true` for errors raised before any network activity.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnregisteredClient(_)
                | Self::UnregisteredResource { .. }
                | Self::UnregisteredRoute { .. }
                | Self::NoContract { .. }
                | Self::WrongRequestType { .. }
                | Self::WrongResponseType { .. }
                | Self::NoResponseSchema { .. }
                | Self::UnregisteredContentType(_)
                | Self::UnregisteredService(_)
                | Self::MissingPathParameter { .. }
                | Self::Configuration(_)
        )
    }
}
