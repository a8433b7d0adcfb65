//! Route proxy: serialize, run the pipeline, box the outcome.

use std::fmt;
use std::sync::Arc;

use rivet_core::{
    BodySerializers, CollectionIterator, CollectionParser, Error, ErrorParser, HttpError, Method,
    Params, ResponseBox, Result, RouteKind, RouteSchema, Timeout, WireResponse, serialize_request,
};
use tower::ServiceExt;

use crate::pipeline::{Call, Middleware, SharedHandler, compose};
use crate::registry::ResourceRoutes;

/// Dispatch machinery shared by a factory, its clients and their proxies.
pub(crate) struct Engine<E> {
    pub(crate) terminal: SharedHandler,
    pub(crate) middlewares: Vec<Middleware>,
    pub(crate) timeout: Timeout,
    pub(crate) serializers: Arc<BodySerializers>,
    pub(crate) collection_parser: Arc<dyn CollectionParser>,
    pub(crate) error_parser: ErrorParser<E>,
}

impl<E> Clone for Engine<E> {
    fn clone(&self) -> Self {
        Self {
            terminal: self.terminal.clone(),
            middlewares: self.middlewares.clone(),
            timeout: self.timeout,
            serializers: Arc::clone(&self.serializers),
            collection_parser: Arc::clone(&self.collection_parser),
            error_parser: self.error_parser.clone(),
        }
    }
}

impl<E> Engine<E> {
    /// Prepend: the most recently added middleware is always innermost.
    pub(crate) fn add_middleware(&mut self, middleware: Middleware) {
        self.middlewares.insert(0, middleware);
    }
}

/// Outcome of one dispatch, before boxing.
struct Dispatched {
    outcome: std::result::Result<WireResponse, HttpError>,
    schema: RouteSchema,
    path: String,
}

/// Calls the routes of one resource of one client.
///
/// Verbs on the resource route return a [`ResponseBox`]; `collection_*`
/// verbs target the collection route. [`RouteProxy::collection_get`] yields a
/// [`CollectionIterator`] over the items, validated against the response
/// schema of the route.
///
/// The outer [`Result`] carries configuration, transport and rejection
/// errors; HTTP errors are inside the box.
///
/// # Example
///
/// ```ignore
/// let items = client.resource("item")?;
/// let item: Item = items
///     .get::<Item>(GetItem { item_name: "foo".into() })
///     .await?
///     .unwrap()?;
/// ```
pub struct RouteProxy<E = HttpError> {
    client_name: String,
    resource_name: String,
    endpoint: String,
    routes: ResourceRoutes,
    engine: Engine<E>,
}

impl<E> Clone for RouteProxy<E> {
    fn clone(&self) -> Self {
        Self {
            client_name: self.client_name.clone(),
            resource_name: self.resource_name.clone(),
            endpoint: self.endpoint.clone(),
            routes: self.routes.clone(),
            engine: self.engine.clone(),
        }
    }
}

impl<E> fmt::Debug for RouteProxy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteProxy")
            .field("client_name", &self.client_name)
            .field("resource_name", &self.resource_name)
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.engine.timeout)
            .field("middlewares", &self.engine.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl<E> RouteProxy<E> {
    pub(crate) fn new(
        client_name: impl Into<String>,
        resource_name: impl Into<String>,
        endpoint: impl Into<String>,
        routes: ResourceRoutes,
        engine: Engine<E>,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            resource_name: resource_name.into(),
            endpoint: endpoint.into(),
            routes,
            engine,
        }
    }

    /// Client name.
    #[must_use]
    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    /// Resource name.
    #[must_use]
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Resolved service endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Timeout applied to every call.
    #[must_use]
    pub const fn timeout(&self) -> Timeout {
        self.engine.timeout
    }

    /// Override the timeout of this proxy.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.engine.timeout = timeout.into();
        self
    }

    /// GET on the resource route.
    pub async fn get<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Get, params).await
    }

    /// POST on the resource route.
    pub async fn post<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Post, params).await
    }

    /// PUT on the resource route.
    pub async fn put<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Put, params).await
    }

    /// PATCH on the resource route.
    pub async fn patch<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Patch, params).await
    }

    /// DELETE on the resource route.
    pub async fn delete<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Delete, params).await
    }

    /// HEAD on the resource route.
    pub async fn head<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Head, params).await
    }

    /// OPTIONS on the resource route.
    pub async fn options<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Resource, Method::Options, params).await
    }

    /// GET on the collection route, iterating over the items.
    ///
    /// An HTTP error is returned through the [`ErrorParser`].
    pub async fn collection_get<T>(
        &self,
        params: impl Into<Params>,
    ) -> Result<std::result::Result<CollectionIterator<T>, E>> {
        let dispatched = self
            .dispatch(RouteKind::Collection, Method::Get, params.into())
            .await?;
        match dispatched.outcome {
            Ok(response) => {
                let items = CollectionIterator::new(
                    response,
                    dispatched.schema.response,
                    self.engine.collection_parser.as_ref(),
                )?;
                Ok(Ok(items))
            }
            Err(error) => Ok(Err(self.engine.error_parser.parse(error))),
        }
    }

    /// POST on the collection route.
    pub async fn collection_post<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Post, params).await
    }

    /// PUT on the collection route.
    pub async fn collection_put<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Put, params).await
    }

    /// PATCH on the collection route.
    pub async fn collection_patch<T>(
        &self,
        params: impl Into<Params>,
    ) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Patch, params).await
    }

    /// DELETE on the collection route.
    pub async fn collection_delete<T>(
        &self,
        params: impl Into<Params>,
    ) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Delete, params).await
    }

    /// HEAD on the collection route.
    pub async fn collection_head<T>(&self, params: impl Into<Params>) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Head, params).await
    }

    /// OPTIONS on the collection route.
    pub async fn collection_options<T>(
        &self,
        params: impl Into<Params>,
    ) -> Result<ResponseBox<T, E>> {
        self.call(RouteKind::Collection, Method::Options, params).await
    }

    /// Call any method on either route.
    pub async fn call<T>(
        &self,
        kind: RouteKind,
        method: Method,
        params: impl Into<Params>,
    ) -> Result<ResponseBox<T, E>> {
        let dispatched = self.dispatch(kind, method, params.into()).await?;
        Ok(ResponseBox::new(
            dispatched.outcome,
            dispatched.schema.response,
            method,
            dispatched.path,
            self.engine.error_parser.clone(),
        ))
    }

    async fn dispatch(&self, kind: RouteKind, method: Method, params: Params) -> Result<Dispatched> {
        let route = self
            .routes
            .route(kind)
            .ok_or_else(|| Error::UnregisteredRoute {
                client: self.client_name.clone(),
                resource: self.resource_name.clone(),
                kind,
            })?;
        let schema = *route
            .contract
            .get(method)
            .ok_or_else(|| Error::NoContract {
                method,
                path: route.path.clone(),
            })?;

        let request = {
            let params = schema.request.coerce(params)?;
            serialize_request(
                method,
                &self.url_pattern(&route.path),
                &*params,
                &self.engine.serializers,
            )?
        };

        tracing::debug!(
            client = %self.client_name,
            resource = %self.resource_name,
            %method,
            path = %route.path,
            "dispatching"
        );

        let handler = compose(&self.engine.middlewares, self.engine.terminal.get());
        let call = Call::new(
            request,
            self.client_name.clone(),
            route.path.clone(),
            self.engine.timeout,
        );

        let outcome = match handler.oneshot(call).await {
            Ok(response) => Ok(response),
            Err(Error::Http(error)) => Err(*error),
            Err(error) => return Err(error),
        };

        Ok(Dispatched {
            outcome,
            schema,
            path: route.path.clone(),
        })
    }

    fn url_pattern(&self, path: &str) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{endpoint}{path}")
        } else {
            format!("{endpoint}/{path}")
        }
    }
}
