//! Blocking facade over the async pipeline.
//!
//! Each factory owns a current-thread Tokio runtime and drives the same
//! dispatch path as the async API. Do not call these methods from inside an
//! async context: the runtime refuses to block a thread that is already
//! driving one.
//!
//! ```ignore
//! use rivet::blocking::ClientFactory;
//!
//! let factory = ClientFactory::new(registry, RouterDiscovery::default(), HyperTransport::new())?;
//! let item: Item = factory
//!     .client("catalog")?
//!     .resource("item")?
//!     .get::<Item>(GetItem { item_name: "foo".into() })?
//!     .unwrap()?;
//! ```

use std::fmt;
use std::sync::Arc;

use rivet_core::{
    BodySerializers, CollectionIterator, CollectionParser, Error, ErrorParser, HttpError, Method,
    Params, ResponseBox, Result, RouteKind, Timeout,
};
use tokio::runtime::Runtime;

use crate::discovery::ServiceDiscovery;
use crate::pipeline::Middleware;
use crate::registry::Registry;
use crate::transport::Transport;

fn runtime() -> Result<Arc<Runtime>> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map(Arc::new)
        .map_err(|e| Error::configuration(format!("cannot start blocking runtime: {e}")))
}

/// Blocking [`crate::ClientFactory`].
pub struct ClientFactory<E = HttpError> {
    inner: crate::ClientFactory<E>,
    runtime: Arc<Runtime>,
}

impl<E> fmt::Debug for ClientFactory<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClientFactory").field(&self.inner).finish()
    }
}

impl ClientFactory<HttpError> {
    /// Create a factory and its runtime.
    pub fn new(
        registry: Registry,
        discovery: impl ServiceDiscovery,
        transport: impl Transport,
    ) -> Result<Self> {
        Ok(Self {
            inner: crate::ClientFactory::new(registry, discovery, transport),
            runtime: runtime()?,
        })
    }
}

impl<E> ClientFactory<E> {
    /// See [`crate::ClientFactory::with_timeout`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.inner = self.inner.with_timeout(timeout);
        self
    }

    /// See [`crate::ClientFactory::with_body_serializers`].
    #[must_use]
    pub fn with_body_serializers(mut self, serializers: BodySerializers) -> Self {
        self.inner = self.inner.with_body_serializers(serializers);
        self
    }

    /// See [`crate::ClientFactory::with_collection_parser`].
    #[must_use]
    pub fn with_collection_parser(mut self, parser: impl CollectionParser) -> Self {
        self.inner = self.inner.with_collection_parser(parser);
        self
    }

    /// See [`crate::ClientFactory::with_error_parser`].
    #[must_use]
    pub fn with_error_parser<F>(self, parser: ErrorParser<F>) -> ClientFactory<F> {
        ClientFactory {
            inner: self.inner.with_error_parser(parser),
            runtime: self.runtime,
        }
    }

    /// See [`crate::ClientFactory::add_middleware`].
    #[must_use]
    pub fn add_middleware(mut self, middleware: impl Into<Middleware>) -> Self {
        self.inner = self.inner.add_middleware(middleware);
        self
    }

    /// See [`crate::ClientFactory::initialize`].
    pub fn initialize(&self) -> Result<()> {
        self.runtime.block_on(self.inner.initialize())
    }

    /// See [`crate::ClientFactory::client`].
    pub fn client(&self, name: &str) -> Result<Client<E>> {
        let inner = self.runtime.block_on(self.inner.client(name))?;
        Ok(Client {
            inner,
            runtime: Arc::clone(&self.runtime),
        })
    }
}

/// Blocking [`crate::Client`].
pub struct Client<E = HttpError> {
    inner: crate::Client<E>,
    runtime: Arc<Runtime>,
}

impl<E> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Client").field(&self.inner).finish()
    }
}

impl<E> Client<E> {
    /// Client name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// See [`crate::Client::add_middleware`].
    #[must_use]
    pub fn add_middleware(mut self, middleware: impl Into<Middleware>) -> Self {
        self.inner = self.inner.add_middleware(middleware);
        self
    }

    /// See [`crate::Client::resource`].
    pub fn resource(&self, name: &str) -> Result<RouteProxy<E>> {
        Ok(RouteProxy {
            inner: self.inner.resource(name)?,
            runtime: Arc::clone(&self.runtime),
        })
    }
}

/// Blocking [`crate::RouteProxy`].
pub struct RouteProxy<E = HttpError> {
    inner: crate::RouteProxy<E>,
    runtime: Arc<Runtime>,
}

impl<E> fmt::Debug for RouteProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RouteProxy").field(&self.inner).finish()
    }
}

impl<E> RouteProxy<E> {
    /// See [`crate::RouteProxy::with_timeout`].
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.inner = self.inner.with_timeout(timeout);
        self
    }

    /// GET on the resource route.
    pub fn get<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Get, params)
    }

    /// POST on the resource route.
    pub fn post<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Post, params)
    }

    /// PUT on the resource route.
    pub fn put<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Put, params)
    }

    /// PATCH on the resource route.
    pub fn patch<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Patch, params)
    }

    /// DELETE on the resource route.
    pub fn delete<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Delete, params)
    }

    /// HEAD on the resource route.
    pub fn head<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Head, params)
    }

    /// OPTIONS on the resource route.
    pub fn options<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Options, params)
    }

    /// GET on the collection route, iterating over the items.
    pub fn collection_get<T>(
        &self,
        params: impl Into<Params>,
    ) -> Result<std::result::Result<CollectionIterator<T>, E>> {
        self.runtime.block_on(self.inner.collection_get(params))
    }

    /// POST on the collection route.
    pub fn collection_post<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Post, params)
    }

    /// PUT on the collection route.
    pub fn collection_put<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Put, params)
    }

    /// PATCH on the collection route.
    pub fn collection_patch<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Patch, params)
    }

    /// DELETE on the collection route.
    pub fn collection_delete<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Delete, params)
    }

    /// HEAD on the collection route.
    pub fn collection_head<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Head, params)
    }

    /// OPTIONS on the collection route.
    pub fn collection_options<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Options, params)
    }

    /// See [`crate::RouteProxy::call`].
    pub fn call<T>(
        &self,
        kind: RouteKind,
        method: Method,
        params: impl Into<Params>,
    ) -> Result<ResponseBox<T, E>> {
        self.runtime.block_on(self.inner.call(kind, method, params))
    }
}
