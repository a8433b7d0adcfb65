//! Authorization header middleware.
//!
//! Sets `Authorization: <scheme> <credentials>` on every outgoing request.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use base64::Engine;
use tower::{Layer, Service};

use crate::pipeline::{Call, Middleware};
use crate::{Error, Result, Secret, WireResponse};

const AUTHORIZATION: &str = "Authorization";

/// Layer that adds an `Authorization` header to requests.
///
/// The header value is held as a [`Secret`] and never shows up in `Debug`
/// output.
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::AuthorizationLayer;
///
/// let factory = factory.add_middleware(AuthorizationLayer::bearer("my-secret-token"));
/// ```
#[derive(Debug, Clone)]
pub struct AuthorizationLayer {
    value: Arc<Secret<String>>,
}

impl AuthorizationLayer {
    /// `Authorization: <scheme> <credentials>`.
    pub fn new(scheme: &str, credentials: impl AsRef<str>) -> Self {
        Self {
            value: Arc::new(Secret::new(format!("{scheme} {}", credentials.as_ref()))),
        }
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: impl AsRef<str>) -> Self {
        Self::new("Bearer", token)
    }

    /// `Authorization: Basic <base64(username:password)>`.
    pub fn basic(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self::new("Basic", encoded)
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = Authorization<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authorization {
            inner,
            value: Arc::clone(&self.value),
        }
    }
}

impl From<AuthorizationLayer> for Middleware {
    fn from(layer: AuthorizationLayer) -> Self {
        Self::from_layer(layer)
    }
}

/// Service that adds an `Authorization` header to requests.
#[derive(Debug, Clone)]
pub struct Authorization<S> {
    inner: S,
    value: Arc<Secret<String>>,
}

impl<S> Service<Call> for Authorization<S>
where
    S: Service<Call, Response = WireResponse, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = WireResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut call: Call) -> Self::Future {
        call.request
            .insert_header(AUTHORIZATION, self.value.expose().as_str());

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(call).await })
    }
}
