//! Fixed header middleware.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::pipeline::{Call, Middleware};
use crate::{Error, Result, WireResponse};

/// Layer that merges a fixed set of headers into every request.
///
/// Headers already present on the request are overwritten, whatever their
/// casing.
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::AddHeadersLayer;
///
/// let factory = factory.add_middleware(
///     AddHeadersLayer::new([("User-Agent", "catalog-sync/1.0")]),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct AddHeadersLayer {
    headers: Arc<[(String, String)]>,
}

impl AddHeadersLayer {
    /// Create a layer from header name/value pairs.
    pub fn new<K, V>(headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

impl<S> Layer<S> for AddHeadersLayer {
    type Service = AddHeaders<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AddHeaders {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

impl From<AddHeadersLayer> for Middleware {
    fn from(layer: AddHeadersLayer) -> Self {
        Self::from_layer(layer)
    }
}

/// Service that merges fixed headers into requests.
#[derive(Debug, Clone)]
pub struct AddHeaders<S> {
    inner: S,
    headers: Arc<[(String, String)]>,
}

impl<S> Service<Call> for AddHeaders<S>
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
        for (name, value) in self.headers.iter() {
            call.request.insert_header(name.as_str(), value.as_str());
        }

        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(call).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tower::ServiceExt;
    use tower::util::BoxCloneService;

    use super::*;
    use crate::{Method, Timeout, WireRequest};

    #[tokio::test]
    async fn merges_and_overrides() {
        let terminal = BoxCloneService::new(tower::service_fn(|call: Call| async move {
            let headers = call
                .request
                .headers()
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.clone()))
                .collect::<HashMap<_, _>>();
            Ok::<_, Error>(WireResponse::json_response(
                200,
                HashMap::new(),
                serde_json::to_value(headers).unwrap_or_default(),
            ))
        }));
        let layer = AddHeadersLayer::new([("User-Agent", "rivet-test"), ("Accept", "application/json")]);
        let request = WireRequest::builder(Method::Get, "http://api.local/items")
            .header("accept", "text/plain")
            .header("X-Request-Id", "42")
            .build()
            .expect("request");

        let response = layer
            .layer(terminal)
            .oneshot(Call::new(request, "api", "/items", Timeout::default()))
            .await
            .expect("response");

        assert_eq!(
            response.json(),
            Some(&serde_json::json!({
                "user-agent": "rivet-test",
                "accept": "application/json",
                "x-request-id": "42",
            }))
        );
    }
}
