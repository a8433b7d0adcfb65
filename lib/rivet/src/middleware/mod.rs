//! Middleware layers for rivet clients.
//!
//! Every layer here is a [`tower::Layer`] over the pipeline [`Handler`]
//! and converts into a [`Middleware`], so it can be handed to
//! [`ClientFactory::add_middleware`](crate::ClientFactory::add_middleware) or
//! [`Client::add_middleware`](crate::Client::add_middleware). The middleware
//! added last runs first.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `middleware-metrics` | [`MetricsLayer`] and [`CircuitMetricsListener`] (default) |
//!
//! # Available Layers
//!
//! - [`AuthorizationLayer`] - Adds an `Authorization` header
//! - [`AddHeadersLayer`] - Merges fixed headers into requests
//! - [`LoggingLayer`] - Logs calls using `tracing`
//! - [`CacheLayer`] - Serves `Cache-Control: public` responses from a [`CacheStore`]
//! - [`CircuitBreakerLayer`] - Per-client circuit breaker
//! - [`MetricsLayer`] - Records call counters and latencies
//!
//! # Example
//!
//! ```ignore
//! use rivet::middleware::{CacheLayer, CircuitBreakerLayer, InMemoryCacheStore, LoggingLayer};
//!
//! let factory = ClientFactory::new(registry, RouterDiscovery::default(), HyperTransport::new())
//!     .add_middleware(CacheLayer::new(InMemoryCacheStore::new()))
//!     .add_middleware(CircuitBreakerLayer::default())
//!     .add_middleware(LoggingLayer::new());
//! ```
//!
//! [`Handler`]: crate::Handler
//! [`Middleware`]: crate::Middleware

mod auth;
mod cache;
mod circuit_breaker;
mod headers;
mod logging;
#[cfg(feature = "middleware-metrics")]
mod metrics;

pub use auth::{Authorization, AuthorizationLayer};
pub use cache::{
    Cache, CacheControlPolicy, CacheLayer, CachePolicy, CacheStore, CachedResponse,
    DEFAULT_KEY_SEPARATOR, InMemoryCacheStore,
};
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer, CircuitEvent, CircuitListener,
    CircuitRecord, CircuitState, CircuitStore, InMemoryCircuitStore,
};
pub use headers::{AddHeaders, AddHeadersLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};
#[cfg(feature = "middleware-metrics")]
pub use metrics::{CircuitMetricsListener, Metrics, MetricsLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
