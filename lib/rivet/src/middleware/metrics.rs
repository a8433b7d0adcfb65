//! Metrics middleware using the metrics crate facade.
//!
//! Records call metrics through the `metrics` crate, so any recorder
//! (Prometheus, `StatsD`, ...) installed by the application receives them.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};

use super::circuit_breaker::{CircuitEvent, CircuitListener, CircuitState};
use crate::pipeline::{Call, Middleware};
use crate::{Error, Result, WireResponse};

/// Labels used for metrics.
const LABEL_CLIENT: &str = "client";
const LABEL_METHOD: &str = "method";
const LABEL_PATH: &str = "path";
const LABEL_STATUS: &str = "status";

/// Metric names.
const METRIC_REQUESTS_TOTAL: &str = "rivet_requests_total";
const METRIC_REQUEST_LATENCY: &str = "rivet_request_latency_seconds";
const METRIC_CIRCUIT_STATE: &str = "rivet_circuit_breaker_state";
const METRIC_CIRCUIT_ERRORS: &str = "rivet_circuit_breaker_errors_total";

/// Layer that records call metrics.
///
/// Records the following metrics, labelled by `client`, `method`, `path`
/// (the route template) and `status`:
/// - `rivet_requests_total` (counter)
/// - `rivet_request_latency_seconds` (histogram)
///
/// `status` is the HTTP status when one was received, `circuit_open` for
/// calls rejected by a circuit breaker and `error` otherwise.
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::MetricsLayer;
///
/// let factory = factory.add_middleware(MetricsLayer::new());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer {
    _private: (),
}

impl MetricsLayer {
    /// Create a new metrics layer.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = Metrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Metrics { inner }
    }
}

impl From<MetricsLayer> for Middleware {
    fn from(layer: MetricsLayer) -> Self {
        Self::from_layer(layer)
    }
}

/// Service that records call metrics.
#[derive(Debug, Clone)]
pub struct Metrics<S> {
    inner: S,
}

fn status_label(result: &Result<WireResponse>) -> String {
    match result {
        Ok(response) => response.status().to_string(),
        Err(Error::CircuitOpen { .. }) => "circuit_open".to_string(),
        Err(error) => error
            .status()
            .map_or_else(|| "error".to_string(), |status| status.to_string()),
    }
}

impl<S> Service<Call> for Metrics<S>
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
        let client = call.client_name.clone();
        let method = call.request.method().to_string();
        let path = call.path.clone();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(call).await;
            let status = status_label(&result);

            metrics::histogram!(
                METRIC_REQUEST_LATENCY,
                LABEL_CLIENT => client.clone(),
                LABEL_METHOD => method.clone(),
                LABEL_PATH => path.clone(),
                LABEL_STATUS => status.clone()
            )
            .record(start.elapsed().as_secs_f64());

            metrics::counter!(
                METRIC_REQUESTS_TOTAL,
                LABEL_CLIENT => client,
                LABEL_METHOD => method,
                LABEL_PATH => path,
                LABEL_STATUS => status
            )
            .increment(1);

            result
        })
    }
}

/// [`CircuitListener`] exporting breaker state as metrics.
///
/// - `rivet_circuit_breaker_state` (gauge): 0 closed, 1 open, 2 half-open
/// - `rivet_circuit_breaker_errors_total` (counter): counted failures
///
/// Both are labelled by `client`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitMetricsListener;

const fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    }
}

impl CircuitListener for CircuitMetricsListener {
    fn on_event(&self, event: &CircuitEvent) {
        match event {
            CircuitEvent::Created { client_name } => {
                metrics::gauge!(METRIC_CIRCUIT_STATE, LABEL_CLIENT => client_name.clone())
                    .set(state_value(CircuitState::Closed));
            }
            CircuitEvent::StateChanged {
                client_name, to, ..
            } => {
                metrics::gauge!(METRIC_CIRCUIT_STATE, LABEL_CLIENT => client_name.clone())
                    .set(state_value(*to));
            }
            CircuitEvent::Failed { client_name, .. } => {
                metrics::counter!(METRIC_CIRCUIT_ERRORS, LABEL_CLIENT => client_name.clone())
                    .increment(1);
            }
            CircuitEvent::Recovered { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use tower::{Layer, ServiceExt};

    use super::*;
    use crate::{HttpError, Method, Timeout, WireRequest};

    /// Mock service that returns configurable responses.
    #[derive(Clone)]
    struct MockService {
        status: u16,
        call_count: Arc<AtomicU32>,
    }

    impl MockService {
        fn new(status: u16) -> Self {
            Self {
                status,
                call_count: Arc::new(AtomicU32::new(0)),
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Service<Call> for MockService {
        type Response = WireResponse;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, call: Call) -> Self::Future {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let status = self.status;

            Box::pin(async move {
                let response = WireResponse::from_bytes(status, HashMap::new(), b"");
                match status {
                    0 => Err(Error::connection("mock error")),
                    200..=299 => Ok(response),
                    _ => Err(HttpError::new(call.request, Some(response)).into()),
                }
            })
        }
    }

    fn create_call() -> Call {
        let request = WireRequest::builder(Method::Get, "https://example.com/test")
            .build()
            .expect("request");
        Call::new(request, "api", "/test", Timeout::default())
    }

    #[tokio::test]
    async fn metrics_service_success() {
        let mock = MockService::new(200);
        let mut service = MetricsLayer::new().layer(mock.clone());

        let result = service.ready().await.expect("ready").call(create_call()).await;

        assert_eq!(result.expect("response").status(), 200);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn metrics_service_passes_errors_through() {
        let mock = MockService::new(500);
        let mut service = MetricsLayer::new().layer(mock.clone());

        let result = service.ready().await.expect("ready").call(create_call()).await;

        assert_eq!(result.err().and_then(|e| e.status()), Some(500));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn status_labels() {
        let request = create_call().request;
        let not_found = WireResponse::from_bytes(404, HashMap::new(), b"");

        assert_eq!(status_label(&Ok(not_found.clone())), "404");
        assert_eq!(
            status_label(&Err(HttpError::new(request, Some(not_found)).into())),
            "404"
        );
        assert_eq!(
            status_label(&Err(Error::CircuitOpen {
                client_name: "api".to_string()
            })),
            "circuit_open"
        );
        assert_eq!(status_label(&Err(Error::connection("refused"))), "error");
    }

    #[test]
    fn circuit_state_values() {
        assert!((state_value(CircuitState::Closed) - 0.0).abs() < f64::EPSILON);
        assert!((state_value(CircuitState::Open) - 1.0).abs() < f64::EPSILON);
        assert!((state_value(CircuitState::HalfOpen) - 2.0).abs() < f64::EPSILON);
    }
}
