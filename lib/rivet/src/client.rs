//! Client factory and clients.

use std::fmt;
use std::sync::Arc;

use rivet_core::{
    BodySerializers, CollectionParser, DefaultCollectionParser, Error, ErrorParser, HttpError,
    Result, Timeout,
};
use tokio::sync::OnceCell;
use tower::util::BoxCloneService;

use crate::discovery::ServiceDiscovery;
use crate::pipeline::{Middleware, SharedHandler, TransportService};
use crate::proxy::{Engine, RouteProxy};
use crate::registry::{ClientRegistration, Registry};
use crate::transport::Transport;

/// Builds [`Client`]s from a [`Registry`], a [`ServiceDiscovery`] and a
/// [`Transport`].
///
/// Factory-level settings (timeout, middlewares, parsers) are copied into
/// every client it creates.
///
/// # Example
///
/// ```ignore
/// use rivet::prelude::*;
///
/// let factory = ClientFactory::new(registry, RouterDiscovery::default(), HyperTransport::new())
///     .with_timeout(Duration::from_secs(5))
///     .add_middleware(CircuitBreakerLayer::default())
///     .add_middleware(CacheLayer::new(InMemoryCacheStore::new()));
/// factory.initialize().await?;
///
/// let catalog = factory.client("catalog").await?;
/// let items = catalog.resource("item")?;
/// ```
pub struct ClientFactory<E = HttpError> {
    registry: Arc<Registry>,
    discovery: Arc<dyn ServiceDiscovery>,
    engine: Engine<E>,
    initialized: Arc<OnceCell<()>>,
}

impl<E> Clone for ClientFactory<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            discovery: Arc::clone(&self.discovery),
            engine: self.engine.clone(),
            initialized: Arc::clone(&self.initialized),
        }
    }
}

impl<E> fmt::Debug for ClientFactory<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientFactory")
            .field("registry", &self.registry)
            .field("timeout", &self.engine.timeout)
            .field("middlewares", &self.engine.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl ClientFactory<HttpError> {
    /// Create a factory returning [`HttpError`] as the error type.
    pub fn new(
        registry: Registry,
        discovery: impl ServiceDiscovery,
        transport: impl Transport,
    ) -> Self {
        let terminal = BoxCloneService::new(TransportService::new(transport));
        Self {
            registry: Arc::new(registry),
            discovery: Arc::new(discovery),
            engine: Engine {
                terminal: SharedHandler::new(terminal),
                middlewares: Vec::new(),
                timeout: Timeout::default(),
                serializers: Arc::new(BodySerializers::default()),
                collection_parser: Arc::new(DefaultCollectionParser::default()),
                error_parser: ErrorParser::default(),
            },
            initialized: Arc::new(OnceCell::new()),
        }
    }
}

impl<E> ClientFactory<E> {
    /// Default timeout of the clients.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.engine.timeout = timeout.into();
        self
    }

    /// Replace the body serializers.
    #[must_use]
    pub fn with_body_serializers(mut self, serializers: BodySerializers) -> Self {
        self.engine.serializers = Arc::new(serializers);
        self
    }

    /// Replace the collection parser.
    #[must_use]
    pub fn with_collection_parser(mut self, parser: impl CollectionParser) -> Self {
        self.engine.collection_parser = Arc::new(parser);
        self
    }

    /// Convert HTTP errors into `F` in every [`ResponseBox`](crate::ResponseBox).
    #[must_use]
    pub fn with_error_parser<F>(self, parser: ErrorParser<F>) -> ClientFactory<F> {
        let Engine {
            terminal,
            middlewares,
            timeout,
            serializers,
            collection_parser,
            ..
        } = self.engine;
        ClientFactory {
            registry: self.registry,
            discovery: self.discovery,
            engine: Engine {
                terminal,
                middlewares,
                timeout,
                serializers,
                collection_parser,
                error_parser: parser,
            },
            initialized: self.initialized,
        }
    }

    /// Add a middleware. It becomes the innermost one.
    #[must_use]
    pub fn add_middleware(mut self, middleware: impl Into<Middleware>) -> Self {
        self.engine.add_middleware(middleware.into());
        self
    }

    /// Middlewares, innermost first.
    #[must_use]
    pub fn middlewares(&self) -> &[Middleware] {
        &self.engine.middlewares
    }

    /// The registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run every middleware initializer, once.
    ///
    /// Later calls are no-ops after a successful run, and concurrent callers
    /// wait for the running one. A failing initializer stops the run and
    /// leaves the factory uninitialized.
    pub async fn initialize(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                for middleware in &self.engine.middlewares {
                    middleware.initialize().await?;
                }
                tracing::debug!(
                    middlewares = self.engine.middlewares.len(),
                    "client factory initialized"
                );
                Ok::<_, Error>(())
            })
            .await?;
        Ok(())
    }

    /// Create the client registered under `name`, resolving its endpoint.
    pub async fn client(&self, name: &str) -> Result<Client<E>> {
        let registration = self.registry.client(name)?;
        let endpoint = self
            .discovery
            .resolve(registration.service(), registration.version())
            .await?;
        tracing::debug!(client = %name, %endpoint, "client created");

        Ok(Client {
            registration: Arc::new(registration.clone()),
            endpoint,
            engine: self.engine.clone(),
        })
    }
}

/// A client bound to a resolved service endpoint.
///
/// Holds its own copy of the factory's middleware list.
pub struct Client<E = HttpError> {
    registration: Arc<ClientRegistration>,
    endpoint: String,
    engine: Engine<E>,
}

impl<E> Clone for Client<E> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            endpoint: self.endpoint.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<E> fmt::Debug for Client<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.registration.name())
            .field("endpoint", &self.endpoint)
            .field("middlewares", &self.engine.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl<E> Client<E> {
    /// Client name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.registration.name()
    }

    /// Resolved service endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Add a middleware to this client only. It becomes the innermost one.
    #[must_use]
    pub fn add_middleware(mut self, middleware: impl Into<Middleware>) -> Self {
        self.engine.add_middleware(middleware.into());
        self
    }

    /// Proxy for a registered resource.
    pub fn resource(&self, name: &str) -> Result<RouteProxy<E>> {
        let routes = self.registration.resource(name)?;
        Ok(RouteProxy::new(
            self.registration.name(),
            name,
            self.endpoint.clone(),
            routes.clone(),
            self.engine.clone(),
        ))
    }
}
