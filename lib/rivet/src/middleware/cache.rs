//! HTTP response caching middleware.
//!
//! Two entries are kept per cached representation:
//!
//! - the **vary entry**, keyed by client name, substituted path and query
//!   string, holds the lower-cased `Vary` header names of the last stored
//!   response as a JSON list;
//! - the **response entry**, keyed by the vary key plus the request's values
//!   for those headers, holds the serialized response.
//!
//! Both expire after the response's fresh lifetime: `max-age` minus `Age`,
//! for responses marked `public`. Store failures are logged and treated as
//! misses; they never fail the call.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use rivet_core::substitute_path;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::pipeline::{Call, Middleware};
use crate::{Error, Method, Result, WireRequest, WireResponse};

/// Default separator between key components.
pub const DEFAULT_KEY_SEPARATOR: &str = "$";

#[cfg(feature = "middleware-metrics")]
const METRIC_CACHE_HITS: &str = "rivet_cache_hits_total";
#[cfg(feature = "middleware-metrics")]
const METRIC_CACHE_MISSES: &str = "rivet_cache_misses_total";

/// External key/value store holding cache entries.
pub trait CacheStore: Send + Sync + 'static {
    /// Prepare the store, e.g. open a connection. Called once by
    /// [`ClientFactory::initialize`](crate::ClientFactory::initialize).
    fn initialize(&self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Value stored under `key`, if present and not expired.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Store `value` under `key` for `ttl`.
    fn set(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = Result<()>> + Send;
}

/// Minimum time between two sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// In-process [`CacheStore`].
///
/// Expired entries are dropped when read, and swept from the whole map by
/// `set` at most once per minute.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<Mutex<Entries>>,
}

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<String, (String, Instant)>,
    swept_at: Option<Instant>,
}

impl Entries {
    fn sweep(&mut self, now: Instant) {
        if self
            .swept_at
            .is_some_and(|at| now.saturating_duration_since(at) < SWEEP_INTERVAL)
        {
            return;
        }
        self.values.retain(|_, (_, expires_at)| *expires_at > now);
        self.swept_at = Some(now);
    }
}

impl InMemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries, including expired ones not swept yet.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values
            .len()
    }

    /// Returns `true` if the store holds no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        match entries.values.get(key) {
            Some((value, expires_at)) if *expires_at > now => Ok(Some(value.clone())),
            Some(_) => {
                entries.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.sweep(now);
        entries.values.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }
}

/// Decides what is cached, under which keys, and for how long.
pub trait CachePolicy: Send + Sync + 'static {
    /// Whether the call may be served from or stored in the cache.
    fn handle_request(&self, call: &Call) -> bool;

    /// Key of the vary entry for a call.
    ///
    /// # Errors
    ///
    /// Fails when the path template cannot be filled from the request.
    fn vary_key(&self, call: &Call) -> Result<String>;

    /// Key of the response entry, given the vary header names.
    fn response_key(&self, vary_key: &str, vary: &[String], request: &WireRequest) -> String;

    /// Fresh lifetime of a response, `None` when it must not be stored.
    fn ttl(&self, response: &WireResponse) -> Option<Duration>;
}

/// `Cache-Control` based [`CachePolicy`].
///
/// Only `GET` calls are cached, and only responses whose `Cache-Control`
/// carries `public` and a positive `max-age` (after subtracting `Age`).
#[derive(Debug, Clone)]
pub struct CacheControlPolicy {
    sep: String,
}

impl Default for CacheControlPolicy {
    fn default() -> Self {
        Self {
            sep: DEFAULT_KEY_SEPARATOR.to_string(),
        }
    }
}

impl CacheControlPolicy {
    /// Create a policy with a custom key separator.
    pub fn with_separator(sep: impl Into<String>) -> Self {
        Self { sep: sep.into() }
    }
}

impl CachePolicy for CacheControlPolicy {
    fn handle_request(&self, call: &Call) -> bool {
        call.request.method() == Method::Get
    }

    fn vary_key(&self, call: &Call) -> Result<String> {
        let path = substitute_path(&call.path, call.request.path_params())?;
        let query = call.request.querystring();
        let sep = &self.sep;
        let client = &call.client_name;
        if query.is_empty() {
            Ok(format!("{client}{sep}{path}"))
        } else {
            Ok(format!("{client}{sep}{path}?{query}"))
        }
    }

    fn response_key(&self, vary_key: &str, vary: &[String], request: &WireRequest) -> String {
        let values = vary
            .iter()
            .map(|name| format!("{name}={}", request.header(name).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(&self.sep);
        format!("{vary_key}{}{values}", self.sep)
    }

    fn ttl(&self, response: &WireResponse) -> Option<Duration> {
        let cache_control = response.header("Cache-Control")?;
        let mut public = false;
        let mut max_age = None;
        for directive in cache_control.split(',').map(str::trim) {
            if directive.eq_ignore_ascii_case("public") {
                public = true;
            } else if let Some((name, value)) = directive.split_once('=')
                && name.trim().eq_ignore_ascii_case("max-age")
            {
                max_age = value.trim().trim_matches('"').parse::<i64>().ok();
            }
        }
        if !public {
            return None;
        }

        let age = response
            .header("Age")
            .and_then(|age| age.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let fresh = max_age?.saturating_sub(age);
        u64::try_from(fresh)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Stored form of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResponse {
    /// HTTP status.
    pub status_code: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// JSON payload.
    pub json: serde_json::Value,
}

impl CachedResponse {
    /// Stored form of a JSON response; raw bodies are not cached.
    #[must_use]
    pub fn from_response(response: &WireResponse) -> Option<Self> {
        response.json().map(|json| Self {
            status_code: response.status(),
            headers: response.headers().clone(),
            json: json.clone(),
        })
    }
}

impl From<CachedResponse> for WireResponse {
    fn from(cached: CachedResponse) -> Self {
        Self::json_response(cached.status_code, cached.headers, cached.json)
    }
}

/// Lower-cased `Vary` header names; `None` for `Vary: *`.
fn vary_names(response: &WireResponse) -> Option<Vec<String>> {
    let Some(vary) = response.header("Vary") else {
        return Some(Vec::new());
    };
    let names = vary
        .split(',')
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    (!names.iter().any(|name| name == "*")).then_some(names)
}

/// Layer that serves and stores responses through a [`CacheStore`].
///
/// # Example
///
/// ```ignore
/// use rivet::middleware::{CacheLayer, InMemoryCacheStore};
///
/// let factory = factory.add_middleware(CacheLayer::new(InMemoryCacheStore::new()));
/// ```
pub struct CacheLayer<St, P = CacheControlPolicy> {
    store: Arc<St>,
    policy: Arc<P>,
}

impl<St, P> Clone for CacheLayer<St, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<St, P: fmt::Debug> fmt::Debug for CacheLayer<St, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLayer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<St: CacheStore> CacheLayer<St> {
    /// Cache into `store` with the [`CacheControlPolicy`].
    pub fn new(store: St) -> Self {
        Self {
            store: Arc::new(store),
            policy: Arc::new(CacheControlPolicy::default()),
        }
    }
}

impl<St: CacheStore, P: CachePolicy> CacheLayer<St, P> {
    /// Replace the policy.
    #[must_use]
    pub fn with_policy<Q: CachePolicy>(self, policy: Q) -> CacheLayer<St, Q> {
        CacheLayer {
            store: self.store,
            policy: Arc::new(policy),
        }
    }

    /// The store.
    #[must_use]
    pub fn store(&self) -> &St {
        &self.store
    }
}

impl<S, St, P> Layer<S> for CacheLayer<St, P> {
    type Service = Cache<S, St, P>;

    fn layer(&self, inner: S) -> Self::Service {
        Cache {
            inner,
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<St: CacheStore, P: CachePolicy> From<CacheLayer<St, P>> for Middleware {
    fn from(layer: CacheLayer<St, P>) -> Self {
        let store = Arc::clone(&layer.store);
        Self::from_layer(layer).with_initializer(move || {
            let store = Arc::clone(&store);
            async move { store.initialize().await }
        })
    }
}

/// Caching service.
pub struct Cache<S, St, P = CacheControlPolicy> {
    inner: S,
    store: Arc<St>,
    policy: Arc<P>,
}

impl<S: Clone, St, P> Clone for Cache<S, St, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            store: Arc::clone(&self.store),
            policy: Arc::clone(&self.policy),
        }
    }
}

impl<S, St, P> Service<Call> for Cache<S, St, P>
where
    S: Service<Call, Response = WireResponse, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
    St: CacheStore,
    P: CachePolicy,
{
    type Response = WireResponse;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let mut inner = self.inner.clone();
        let store = Arc::clone(&self.store);
        let policy = Arc::clone(&self.policy);

        Box::pin(async move {
            if !policy.handle_request(&call) {
                return inner.call(call).await;
            }
            let vary_key = match policy.vary_key(&call) {
                Ok(key) => key,
                Err(error) => {
                    warn!(%error, "cannot compute cache key, bypassing cache");
                    return inner.call(call).await;
                }
            };

            match lookup(&*store, &*policy, &vary_key, &call.request).await {
                Ok(Some(response)) => {
                    debug!(key = %vary_key, "cache hit");
                    count(CacheOutcome::Hit, &call);
                    return Ok(response);
                }
                Ok(None) => debug!(key = %vary_key, "cache miss"),
                Err(error) => warn!(key = %vary_key, %error, "cache lookup failed"),
            }
            count(CacheOutcome::Miss, &call);

            let request = call.request.clone();
            let response = inner.call(call).await?;
            if let Err(error) = store_response(&*store, &*policy, &vary_key, &request, &response).await {
                warn!(key = %vary_key, %error, "cache store failed");
            }
            Ok(response)
        })
    }
}

async fn lookup<St, P>(
    store: &St,
    policy: &P,
    vary_key: &str,
    request: &WireRequest,
) -> Result<Option<WireResponse>>
where
    St: CacheStore,
    P: CachePolicy,
{
    let Some(vary) = store.get(vary_key).await? else {
        return Ok(None);
    };
    let vary = serde_json::from_str::<Vec<String>>(&vary)
        .map_err(|e| Error::cache_store(format!("corrupted vary entry: {e}")))?;

    let response_key = policy.response_key(vary_key, &vary, request);
    let Some(payload) = store.get(&response_key).await? else {
        return Ok(None);
    };
    let cached = serde_json::from_str::<CachedResponse>(&payload)
        .map_err(|e| Error::cache_store(format!("corrupted response entry: {e}")))?;
    Ok(Some(cached.into()))
}

async fn store_response<St, P>(
    store: &St,
    policy: &P,
    vary_key: &str,
    request: &WireRequest,
    response: &WireResponse,
) -> Result<()>
where
    St: CacheStore,
    P: CachePolicy,
{
    let Some(ttl) = policy.ttl(response) else {
        return Ok(());
    };
    let Some(vary) = vary_names(response) else {
        return Ok(());
    };
    let Some(cached) = CachedResponse::from_response(response) else {
        return Ok(());
    };

    let response_key = policy.response_key(vary_key, &vary, request);
    let vary = serde_json::to_string(&vary)?;
    let payload = serde_json::to_string(&cached)?;
    store.set(vary_key, vary, ttl).await?;
    store.set(&response_key, payload, ttl).await?;
    debug!(key = %response_key, ttl_secs = ttl.as_secs(), "response cached");
    Ok(())
}

#[derive(Clone, Copy)]
enum CacheOutcome {
    Hit,
    Miss,
}

#[cfg(feature = "middleware-metrics")]
fn count(outcome: CacheOutcome, call: &Call) {
    let name = match outcome {
        CacheOutcome::Hit => METRIC_CACHE_HITS,
        CacheOutcome::Miss => METRIC_CACHE_MISSES,
    };
    metrics::counter!(
        name,
        "client" => call.client_name.clone(),
        "method" => call.request.method().to_string(),
        "path" => call.path.clone()
    )
    .increment(1);
}

#[cfg(not(feature = "middleware-metrics"))]
fn count(_outcome: CacheOutcome, _call: &Call) {}
