//! Call logging middleware.
//!
//! Logs every call through the `tracing` crate. Header values are never
//! logged; the debug level lists header names only.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{Instrument, Level, debug, info, span, warn};

use crate::pipeline::{Call, Middleware};
use crate::{Error, Result, WireResponse};

/// Layer that adds call logging.
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::LoggingLayer;
///
/// let factory = factory.add_middleware(LoggingLayer::debug());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Log level for the logging middleware.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogLevel {
    /// Log at debug level (header names included).
    Debug,
    /// Log at info level (summary only).
    #[default]
    Info,
}

impl LoggingLayer {
    /// Create a new logging layer with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a logging layer that logs at debug level.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

impl From<LoggingLayer> for Middleware {
    fn from(layer: LoggingLayer) -> Self {
        Self::from_layer(layer)
    }
}

/// Service that logs calls.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

impl<S> Service<Call> for Logging<S>
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

    fn call(&mut self, call: Call) -> Self::Future {
        let method = call.request.method();
        let url = call.request.full_url();
        let level = self.level;

        let span = span!(
            Level::INFO,
            "rivet_call",
            client = %call.client_name,
            %method,
            path = %call.path,
            %url
        );

        let mut inner = self.inner.clone();
        Box::pin(
            async move {
                let start = Instant::now();

                match level {
                    LogLevel::Debug => {
                        let headers = call.request.headers().keys().cloned().collect::<Vec<_>>();
                        debug!(
                            ?headers,
                            body_len = call.request.body().len(),
                            timeout = %call.timeout,
                            "sending request"
                        );
                    }
                    LogLevel::Info => {
                        info!("sending request");
                    }
                }

                let result = inner.call(call).await;
                let elapsed = start.elapsed();

                // Saturating conversion to u64 (truncates after ~584 million years)
                let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        info!(status = response.status(), elapsed_ms, "request completed");
                    }
                    Err(Error::Http(err)) => {
                        warn!(status = err.status(), elapsed_ms, "request failed with HTTP error");
                    }
                    Err(err) => {
                        warn!(error = %err, elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tower::ServiceExt;
    use tower::util::BoxCloneService;

    use super::*;
    use crate::{Method, Timeout, WireRequest};

    #[test]
    fn logging_layer_default() {
        let layer = LoggingLayer::new();
        assert!(matches!(layer.level, LogLevel::Info));
    }

    #[test]
    fn logging_layer_debug() {
        let layer = LoggingLayer::debug();
        assert!(matches!(layer.level, LogLevel::Debug));
    }

    #[tokio::test]
    async fn passes_outcome_through() {
        let terminal = BoxCloneService::new(tower::service_fn(|_call: Call| async {
            Ok::<_, Error>(WireResponse::from_bytes(204, HashMap::new(), b""))
        }));
        let service = LoggingLayer::debug().layer(terminal);
        let request = WireRequest::builder(Method::Delete, "http://api.local/items/1")
            .header("Authorization", "Bearer secret")
            .build()
            .expect("request");

        let response = service
            .oneshot(Call::new(request, "api", "/items/{id}", Timeout::default()))
            .await
            .expect("response");

        assert_eq!(response.status(), 204);
    }
}
