//! Prelude module for convenient imports.
//!
//! ```ignore
//! use rivet::prelude::*;
//! ```

pub use crate::middleware::{
    AuthorizationLayer, CacheLayer, CircuitBreakerConfig, CircuitBreakerLayer,
    InMemoryCacheStore, LoggingLayer,
};
pub use crate::{
    Client, ClientFactory, CollectionIterator, Error, ErrorParser, HttpError, HyperTransport,
    Method, NoParams, Params, Registration, Registry, Request, ResourceContract, ResponseBox,
    Result, RouteKind, RouterDiscovery, Secret, StaticDiscovery, Timeout,
};
pub use serde::{Deserialize, Serialize};
