//! Circuit breaker middleware.
//!
//! One breaker per client name, created lazily on the first call and kept
//! for the lifetime of the store:
//!
//! - `Closed`: calls pass through. `threshold` consecutive counted failures
//!   open the circuit.
//! - `Open`: calls are rejected with [`Error::CircuitOpen`] without reaching
//!   the inner handler, until `ttl` has elapsed since the circuit opened.
//! - `HalfOpen`: a single trial call goes through. Success closes the
//!   circuit, a counted failure opens it again.
//!
//! A failure is counted unless the exclusion predicate matches it; by
//! default 4xx HTTP errors are excluded and count as successes.
//!
//! Only the outcome of the current trial moves the circuit out of
//! `HalfOpen`. Outcomes of calls admitted earlier only touch the failure
//! count.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use derive_more::Display;
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, info, warn};

use crate::pipeline::{Call, Middleware};
use crate::{Error, Result, WireResponse};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CircuitState {
    /// Calls flow normally.
    #[display("closed")]
    Closed,
    /// Calls are rejected immediately.
    #[display("open")]
    Open,
    /// A single trial call is allowed.
    #[display("half_open")]
    HalfOpen,
}

/// Breaker state of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitRecord {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive counted failures.
    pub failure_count: u32,
    /// When the circuit opened, or when the current half-open trial started.
    pub opened_at: Option<Instant>,
    /// Whether the half-open trial call is still running.
    pub trial_in_flight: bool,
    /// Generation of the latest half-open trial.
    pub trial: u64,
}

impl Default for CircuitRecord {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            trial_in_flight: false,
            trial: 0,
        }
    }
}

/// Storage of per-client breaker records.
///
/// Implementations serialize access per client: `update` runs the closure
/// with exclusive access to the record.
pub trait CircuitStore: Send + Sync + 'static {
    /// Run `update` on the record of `client_name`, creating it on first use.
    ///
    /// Returns the closure result and whether the record was just created.
    fn update<R>(&self, client_name: &str, update: impl FnOnce(&mut CircuitRecord) -> R) -> (R, bool);

    /// Copy of the record of `client_name`, if any.
    fn get(&self, client_name: &str) -> Option<CircuitRecord>;
}

/// In-process [`CircuitStore`] with one lock per client.
#[derive(Debug, Default)]
pub struct InMemoryCircuitStore {
    records: Mutex<HashMap<String, Arc<Mutex<CircuitRecord>>>>,
}

impl InMemoryCircuitStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, client_name: &str) -> (Arc<Mutex<CircuitRecord>>, bool) {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(record) = records.get(client_name) {
            return (Arc::clone(record), false);
        }
        let record = Arc::new(Mutex::new(CircuitRecord::default()));
        records.insert(client_name.to_string(), Arc::clone(&record));
        (record, true)
    }
}

impl CircuitStore for InMemoryCircuitStore {
    fn update<R>(&self, client_name: &str, update: impl FnOnce(&mut CircuitRecord) -> R) -> (R, bool) {
        let (record, created) = self.record(client_name);
        let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
        (update(&mut record), created)
    }

    fn get(&self, client_name: &str) -> Option<CircuitRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .get(client_name)
            .map(|record| *record.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Notification sent to [`CircuitListener`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CircuitEvent {
    /// A breaker was created for a client.
    Created {
        /// Client name.
        client_name: String,
    },
    /// A counted failure was recorded.
    Failed {
        /// Client name.
        client_name: String,
        /// Consecutive counted failures, this one included.
        failure_count: u32,
        /// The failure.
        error: String,
    },
    /// The breaker changed state.
    StateChanged {
        /// Client name.
        client_name: String,
        /// Previous state.
        from: CircuitState,
        /// New state.
        to: CircuitState,
    },
    /// A half-open trial succeeded and the circuit closed.
    Recovered {
        /// Client name.
        client_name: String,
    },
}

/// Observer of breaker events. Listeners have no effect on the transitions.
pub trait CircuitListener: Send + Sync + 'static {
    /// Handle an event.
    fn on_event(&self, event: &CircuitEvent);
}

impl<F> CircuitListener for F
where
    F: Fn(&CircuitEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &CircuitEvent) {
        self(event);
    }
}

type ExclusionPredicate = Arc<dyn Fn(&Error) -> bool + Send + Sync>;

/// Configuration for the circuit breaker.
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive counted failures before opening the circuit.
    pub threshold: u32,
    /// Time the circuit stays open before a trial call is allowed.
    pub ttl: Duration,
    exclude: ExclusionPredicate,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            ttl: Duration::from_secs(30),
            exclude: Arc::new(Error::is_client_error),
        }
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("threshold", &self.threshold)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration with the default exclusion predicate.
    #[must_use]
    pub fn new(threshold: u32, ttl: Duration) -> Self {
        Self {
            threshold,
            ttl,
            ..Self::default()
        }
    }

    /// Set the failure threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the open duration.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replace the predicate selecting errors that do not count as failures.
    #[must_use]
    pub fn with_exclusion(mut self, exclude: impl Fn(&Error) -> bool + Send + Sync + 'static) -> Self {
        self.exclude = Arc::new(exclude);
        self
    }

    /// Returns `true` if `error` does not count as a failure.
    #[must_use]
    pub fn is_excluded(&self, error: &Error) -> bool {
        (self.exclude)(error)
    }
}

/// Admission of a call, with the trial generation when it is the half-open
/// trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Admission {
    trial: Option<u64>,
}

/// Shared breaker machinery.
struct Breaker<St> {
    config: Arc<CircuitBreakerConfig>,
    store: Arc<St>,
    listeners: Arc<Vec<Arc<dyn CircuitListener>>>,
}

impl<St> Clone for Breaker<St> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<St: CircuitStore> Breaker<St> {
    /// Admit or reject a call.
    fn acquire(&self, client_name: &str) -> Result<Admission> {
        let now = Instant::now();
        let ttl = self.config.ttl;
        let ((admission, transition), created) = self.store.update(client_name, |record| {
            let elapsed = |record: &CircuitRecord| {
                record
                    .opened_at
                    .is_none_or(|at| now.saturating_duration_since(at) >= ttl)
            };
            let start_trial = |record: &mut CircuitRecord| {
                record.opened_at = Some(now);
                record.trial_in_flight = true;
                record.trial = record.trial.wrapping_add(1);
                Some(Admission {
                    trial: Some(record.trial),
                })
            };
            match record.state {
                CircuitState::Closed => (Some(Admission { trial: None }), None),
                CircuitState::Open if elapsed(record) => {
                    record.state = CircuitState::HalfOpen;
                    (
                        start_trial(record),
                        Some((CircuitState::Open, CircuitState::HalfOpen)),
                    )
                }
                CircuitState::Open => (None, None),
                // an abandoned trial is replaced once ttl has elapsed again
                CircuitState::HalfOpen if !record.trial_in_flight || elapsed(record) => {
                    (start_trial(record), None)
                }
                CircuitState::HalfOpen => (None, None),
            }
        });

        let mut events = Vec::new();
        if created {
            events.push(CircuitEvent::Created {
                client_name: client_name.to_string(),
            });
        }
        if let Some((from, to)) = transition {
            events.push(CircuitEvent::StateChanged {
                client_name: client_name.to_string(),
                from,
                to,
            });
        }
        self.emit(&events);

        admission.ok_or_else(|| {
            warn!(client = %client_name, "circuit open, call rejected");
            Error::CircuitOpen {
                client_name: client_name.to_string(),
            }
        })
    }

    /// Record the outcome of an admitted call.
    fn record(&self, client_name: &str, admission: Admission, result: &Result<WireResponse>) {
        let counted = match result {
            Err(error) if !self.config.is_excluded(error) => Some(error),
            _ => None,
        };
        let now = Instant::now();
        let threshold = self.config.threshold.max(1);

        let (events, _) = self.store.update(client_name, |record| {
            let mut events = Vec::new();
            let from = record.state;
            let is_trial = from == CircuitState::HalfOpen
                && admission.trial.is_some_and(|trial| trial == record.trial);
            match counted {
                None => {
                    record.failure_count = 0;
                    if is_trial {
                        record.state = CircuitState::Closed;
                        record.opened_at = None;
                        record.trial_in_flight = false;
                        events.push(CircuitEvent::StateChanged {
                            client_name: client_name.to_string(),
                            from,
                            to: CircuitState::Closed,
                        });
                        events.push(CircuitEvent::Recovered {
                            client_name: client_name.to_string(),
                        });
                    }
                }
                Some(error) => {
                    record.failure_count = record.failure_count.saturating_add(1);
                    events.push(CircuitEvent::Failed {
                        client_name: client_name.to_string(),
                        failure_count: record.failure_count,
                        error: error.to_string(),
                    });
                    let opens = match from {
                        CircuitState::Closed => record.failure_count >= threshold,
                        CircuitState::HalfOpen => is_trial,
                        CircuitState::Open => false,
                    };
                    if opens {
                        record.state = CircuitState::Open;
                        record.opened_at = Some(now);
                        record.trial_in_flight = false;
                        events.push(CircuitEvent::StateChanged {
                            client_name: client_name.to_string(),
                            from,
                            to: CircuitState::Open,
                        });
                    }
                }
            }
            events
        });

        self.emit(&events);
    }

    fn emit(&self, events: &[CircuitEvent]) {
        for event in events {
            match event {
                CircuitEvent::Created { client_name } => {
                    debug!(client = %client_name, "circuit breaker created");
                }
                CircuitEvent::Failed {
                    client_name,
                    failure_count,
                    error,
                } => {
                    debug!(client = %client_name, failure_count, %error, "failure counted");
                }
                CircuitEvent::StateChanged {
                    client_name,
                    from,
                    to,
                } => {
                    info!(client = %client_name, %from, %to, "circuit state changed");
                }
                CircuitEvent::Recovered { client_name } => {
                    info!(client = %client_name, "circuit recovered");
                }
            }
            for listener in self.listeners.iter() {
                listener.on_event(event);
            }
        }
    }
}

/// Layer that guards calls with a per-client circuit breaker.
///
/// Clones share the same breaker state.
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::{CircuitBreakerConfig, CircuitBreakerLayer};
/// use std::time::Duration;
///
/// let breaker = CircuitBreakerLayer::new(
///     CircuitBreakerConfig::default()
///         .with_threshold(3)
///         .with_ttl(Duration::from_secs(60)),
/// );
/// let factory = factory.add_middleware(breaker.clone());
/// ```
pub struct CircuitBreakerLayer<St = InMemoryCircuitStore> {
    breaker: Breaker<St>,
}

impl<St> Clone for CircuitBreakerLayer<St> {
    fn clone(&self) -> Self {
        Self {
            breaker: self.breaker.clone(),
        }
    }
}

impl<St> fmt::Debug for CircuitBreakerLayer<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerLayer")
            .field("config", &self.breaker.config)
            .field("listeners", &self.breaker.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Default for CircuitBreakerLayer {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreakerLayer {
    /// Create a breaker with an in-memory store.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self::with_store(config, InMemoryCircuitStore::new())
    }
}

impl<St: CircuitStore> CircuitBreakerLayer<St> {
    /// Create a breaker over a custom store.
    pub fn with_store(config: CircuitBreakerConfig, store: St) -> Self {
        Self {
            breaker: Breaker {
                config: Arc::new(config),
                store: Arc::new(store),
                listeners: Arc::new(Vec::new()),
            },
        }
    }

    /// Attach an event listener.
    #[must_use]
    pub fn with_listener(mut self, listener: impl CircuitListener) -> Self {
        Arc::make_mut(&mut self.breaker.listeners).push(Arc::new(listener));
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.breaker.config
    }

    /// Current record of a client, if its breaker exists.
    #[must_use]
    pub fn record(&self, client_name: &str) -> Option<CircuitRecord> {
        self.breaker.store.get(client_name)
    }

    /// Current state of a client, if its breaker exists.
    #[must_use]
    pub fn state(&self, client_name: &str) -> Option<CircuitState> {
        self.record(client_name).map(|record| record.state)
    }
}

impl<S, St> Layer<S> for CircuitBreakerLayer<St> {
    type Service = CircuitBreaker<S, St>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreaker {
            inner,
            breaker: self.breaker.clone(),
        }
    }
}

impl<St: CircuitStore> From<CircuitBreakerLayer<St>> for Middleware {
    fn from(layer: CircuitBreakerLayer<St>) -> Self {
        Self::from_layer(layer)
    }
}

/// Service guarded by a circuit breaker.
pub struct CircuitBreaker<S, St = InMemoryCircuitStore> {
    inner: S,
    breaker: Breaker<St>,
}

impl<S: Clone, St> Clone for CircuitBreaker<S, St> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            breaker: self.breaker.clone(),
        }
    }
}

impl<S, St> fmt::Debug for CircuitBreaker<S, St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.breaker.config)
            .finish_non_exhaustive()
    }
}

impl<S, St> Service<Call> for CircuitBreaker<S, St>
where
    S: Service<Call, Response = WireResponse, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    St: CircuitStore,
{
    type Response = WireResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let breaker = self.breaker.clone();
        let client_name = call.client_name.clone();

        let admission = match breaker.acquire(&client_name) {
            Ok(admission) => admission,
            Err(rejection) => return Box::pin(async move { Err(rejection) }),
        };

        let mut inner = self.inner.clone();
        Box::pin(async move {
            let result = inner.call(call).await;
            breaker.record(&client_name, admission, &result);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

    use tower::ServiceExt;

    use super::*;
    use crate::{HttpError, Method, Timeout, WireRequest};

    /// Mock service answering with a configurable status; 0 is a connection error.
    #[derive(Clone)]
    struct MockService {
        status: Arc<AtomicU16>,
        call_count: Arc<AtomicU32>,
    }

    impl MockService {
        fn new(status: u16) -> Self {
            Self {
                status: Arc::new(AtomicU16::new(status)),
                call_count: Arc::new(AtomicU32::new(0)),
            }
        }

        fn set_status(&self, status: u16) {
            self.status.store(status, Ordering::SeqCst);
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
            let status = self.status.load(Ordering::SeqCst);

            Box::pin(async move {
                let response = WireResponse::from_bytes(status, HashMap::new(), b"{}");
                match status {
                    0 => Err(Error::connection("mock error")),
                    200..=299 => Ok(response),
                    _ => Err(HttpError::new(call.request, Some(response)).into()),
                }
            })
        }
    }

    fn call_for(client: &str) -> Call {
        let request = WireRequest::builder(Method::Get, "http://api.local/items")
            .build()
            .expect("request");
        Call::new(request, client, "/items", Timeout::default())
    }

    async fn send<S>(service: &mut S, client: &str) -> Result<WireResponse>
    where
        S: Service<Call, Response = WireResponse, Error = Error>,
    {
        service.ready().await.expect("ready").call(call_for(client)).await
    }

    fn layer(threshold: u32) -> CircuitBreakerLayer {
        CircuitBreakerLayer::new(CircuitBreakerConfig::new(
            threshold,
            Duration::from_secs(30),
        ))
    }

    #[test]
    fn default_config() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.threshold, 5);
        assert_eq!(config.ttl, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_and_rejects() {
        let mock = MockService::new(500);
        let layer = layer(2);
        let mut service = layer.layer(mock.clone());

        assert!(send(&mut service, "api").await.is_err());
        assert_eq!(layer.state("api"), Some(CircuitState::Closed));
        assert!(send(&mut service, "api").await.is_err());
        assert_eq!(layer.state("api"), Some(CircuitState::Open));

        let rejected = send(&mut service, "api").await;
        assert!(matches!(
            rejected,
            Err(Error::CircuitOpen { ref client_name }) if client_name == "api"
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_success_closes() {
        let mock = MockService::new(500);
        let layer = layer(2);
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "api").await;
        let _ = send(&mut service, "api").await;
        assert_eq!(layer.state("api"), Some(CircuitState::Open));

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(send(&mut service, "api").await.is_err());
        assert_eq!(mock.call_count(), 2);

        tokio::time::advance(Duration::from_secs(1)).await;
        mock.set_status(200);
        assert!(send(&mut service, "api").await.is_ok());
        assert_eq!(mock.call_count(), 3);

        let record = layer.record("api").expect("record");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failure_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_trial_failure_reopens() {
        let mock = MockService::new(0);
        let layer = layer(1);
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "api").await;
        assert_eq!(layer.state("api"), Some(CircuitState::Open));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(send(&mut service, "api").await.is_err());
        assert_eq!(mock.call_count(), 2);
        assert_eq!(layer.state("api"), Some(CircuitState::Open));

        // the ttl restarts from the failed trial
        assert!(matches!(
            send(&mut service, "api").await,
            Err(Error::CircuitOpen { .. })
        ));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_a_single_trial() {
        let layer = layer(1);
        let breaker = layer.breaker.clone();

        let admission = breaker.acquire("api").expect("closed");
        breaker.record("api", admission, &Err(Error::connection("down")));
        tokio::time::advance(Duration::from_secs(30)).await;

        breaker.acquire("api").expect("trial");
        assert_eq!(layer.state("api"), Some(CircuitState::HalfOpen));
        assert!(breaker.acquire("api").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn late_outcomes_do_not_end_the_trial() {
        let layer = layer(1);
        let breaker = layer.breaker.clone();
        let ok = || Ok(WireResponse::from_bytes(200, HashMap::new(), b"{}"));

        let slow = breaker.acquire("api").expect("closed");
        let failing = breaker.acquire("api").expect("closed");
        breaker.record("api", failing, &Err(Error::connection("down")));
        assert_eq!(layer.state("api"), Some(CircuitState::Open));

        tokio::time::advance(Duration::from_secs(30)).await;
        let trial = breaker.acquire("api").expect("trial");

        // the call admitted while closed finishes during the trial
        breaker.record("api", slow, &ok());
        assert_eq!(layer.state("api"), Some(CircuitState::HalfOpen));
        assert!(breaker.acquire("api").is_err());

        breaker.record("api", slow, &Err(Error::connection("late")));
        assert_eq!(layer.state("api"), Some(CircuitState::HalfOpen));
        assert!(breaker.acquire("api").is_err());

        breaker.record("api", trial, &ok());
        let record = layer.record("api").expect("record");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failure_count, 0);
        assert!(breaker.acquire("api").is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_trial_outcome_is_stale() {
        let layer = layer(1);
        let breaker = layer.breaker.clone();

        let admission = breaker.acquire("api").expect("closed");
        breaker.record("api", admission, &Err(Error::connection("down")));
        tokio::time::advance(Duration::from_secs(30)).await;

        let abandoned = breaker.acquire("api").expect("first trial");
        tokio::time::advance(Duration::from_secs(30)).await;
        let trial = breaker.acquire("api").expect("second trial");

        breaker.record("api", abandoned, &Err(Error::connection("late")));
        assert_eq!(layer.state("api"), Some(CircuitState::HalfOpen));

        breaker.record("api", trial, &Err(Error::connection("still down")));
        assert_eq!(layer.state("api"), Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn client_errors_are_not_counted() {
        let mock = MockService::new(404);
        let layer = layer(2);
        let mut service = layer.layer(mock.clone());

        for _ in 0..5 {
            let result = send(&mut service, "api").await;
            assert_eq!(result.err().and_then(|e| e.status()), Some(404));
        }

        let record = layer.record("api").expect("record");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failure_count, 0);
        assert_eq!(mock.call_count(), 5);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failures() {
        let mock = MockService::new(503);
        let layer = layer(2);
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "api").await;
        mock.set_status(200);
        let _ = send(&mut service, "api").await;
        mock.set_status(503);
        let _ = send(&mut service, "api").await;

        let record = layer.record("api").expect("record");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.failure_count, 1);
    }

    #[tokio::test]
    async fn breakers_are_per_client() {
        let mock = MockService::new(500);
        let layer = layer(1);
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "billing").await;
        assert_eq!(layer.state("billing"), Some(CircuitState::Open));
        assert_eq!(layer.state("catalog"), None);

        mock.set_status(200);
        assert!(send(&mut service, "catalog").await.is_ok());
        assert_eq!(layer.state("catalog"), Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn custom_exclusion() {
        let mock = MockService::new(503);
        let layer = CircuitBreakerLayer::new(
            CircuitBreakerConfig::new(1, Duration::from_secs(30))
                .with_exclusion(|error| error.status() == Some(503)),
        );
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "api").await;
        assert_eq!(layer.state("api"), Some(CircuitState::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn listeners_receive_events() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let mock = MockService::new(500);
        let layer = layer(1).with_listener(move |event: &CircuitEvent| {
            sink.lock().expect("events").push(event.clone());
        });
        let mut service = layer.layer(mock.clone());

        let _ = send(&mut service, "api").await;
        tokio::time::advance(Duration::from_secs(30)).await;
        mock.set_status(200);
        let _ = send(&mut service, "api").await;

        let events = events.lock().expect("events").clone();
        let client_name = "api".to_string();
        assert_eq!(
            events,
            vec![
                CircuitEvent::Created {
                    client_name: client_name.clone()
                },
                CircuitEvent::Failed {
                    client_name: client_name.clone(),
                    failure_count: 1,
                    error: "HTTP error 500 on GET http://api.local/items".to_string(),
                },
                CircuitEvent::StateChanged {
                    client_name: client_name.clone(),
                    from: CircuitState::Closed,
                    to: CircuitState::Open,
                },
                CircuitEvent::StateChanged {
                    client_name: client_name.clone(),
                    from: CircuitState::Open,
                    to: CircuitState::HalfOpen,
                },
                CircuitEvent::StateChanged {
                    client_name: client_name.clone(),
                    from: CircuitState::HalfOpen,
                    to: CircuitState::Closed,
                },
                CircuitEvent::Recovered { client_name },
            ]
        );
    }
}
