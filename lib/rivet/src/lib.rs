//! Contract-driven REST client with a composable middleware pipeline.
//!
//! Clients are registered up front: each resource gets a resource route, a
//! collection route, or both, and every route declares which methods it
//! accepts through a [`ResourceContract`]. A call serializes its typed
//! parameters into a [`WireRequest`], runs it through the middleware
//! pipeline down to the [`Transport`], and hands back a lazy
//! [`ResponseBox`] (or a [`CollectionIterator`] for list responses).
//!
//! # Example
//!
//! ```ignore
//! use rivet::prelude::*;
//!
//! #[derive(Debug, Request, Deserialize)]
//! struct GetItem {
//!     #[field(path)]
//!     item_name: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct Item {
//!     name: String,
//! }
//!
//! let registry = Registry::default().with(
//!     Registration::new("catalog", "item", "catalog-service")
//!         .version("v1")
//!         .resource("/items/{item_name}", ResourceContract::new().route::<GetItem, Item>(Method::Get)),
//! )?;
//!
//! let factory = ClientFactory::new(registry, RouterDiscovery::default(), HyperTransport::new())
//!     .add_middleware(CircuitBreakerLayer::default());
//! factory.initialize().await?;
//!
//! let item: Item = factory
//!     .client("catalog")
//!     .await?
//!     .resource("item")?
//!     .get::<Item>(GetItem { item_name: "foo".into() })
//!     .await?
//!     .unwrap()?;
//! ```
//!
//! A blocking facade with the same surface lives in [`blocking`].

extern crate self as rivet;

pub mod blocking;
mod client;
mod config;
mod connector;
mod contract;
mod discovery;
pub mod middleware;
mod pipeline;
pub mod prelude;
mod proxy;
mod registry;
mod transport;

pub use client::{Client, ClientFactory};
pub use config::{TransportConfig, TransportConfigBuilder};
pub use contract::ResourceContract;
pub use discovery::{DEFAULT_ROUTER, RouterDiscovery, ServiceDiscovery, StaticDiscovery};
pub use pipeline::{Call, Handler, HandlerFuture, Middleware, TransportService, compose};
pub use proxy::RouteProxy;
pub use registry::{ClientRegistration, Registration, Registry, ResourceRoutes, Route};
pub use transport::{HyperTransport, Transport};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use rivet_core::{
    APPLICATION_JSON, BodySerializer, BodySerializers, CollectionIterator, CollectionParser,
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DefaultCollectionParser, Error, ErrorParser,
    FORM_URLENCODED, Field, FieldLocation, FormUrlEncodedSerializer, HttpError, JsonSerializer,
    Link, Metadata, Method, NoParams, Params, QueryValue, RequestSchema, RequestSchemaInfo,
    ResponseBody, ResponseBox, ResponseSchemaInfo, Result, RouteKind, RouteSchema, Secret,
    TOTAL_COUNT_HEADER, Timeout, TypedParams, WireRequest, WireRequestBuilder, WireResponse,
    from_json, from_value, parse_links, serialize_request, substitute_path, to_form, to_json,
};

// Re-export http types for status codes and headers
pub use rivet_core::{StatusCode, header};

// Re-export macros
pub use rivet_macro::Request;
