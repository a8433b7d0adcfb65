//! Middleware pipeline: the [`Call`] flowing through it, the [`Handler`]
//! services it is made of, and the [`Middleware`] wrappers composing them.
//!
//! A middleware is a function `Handler -> Handler`. [`compose`] folds a list
//! of middlewares around a terminal handler in index order, so the element at
//! index 0 is the innermost wrapper (runs last on the way in, right before the
//! transport) and the last element is the outermost (runs first).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use rivet_core::{Error, Result, Timeout, WireRequest, WireResponse};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;

use crate::transport::Transport;

/// One dispatch through the pipeline.
#[derive(Debug, Clone)]
pub struct Call {
    /// The serialized request.
    pub request: WireRequest,
    /// Name of the client the call belongs to.
    pub client_name: String,
    /// Raw route path template, e.g. `/items/{item_name}`.
    pub path: String,
    /// Timeout enforced by the transport.
    pub timeout: Timeout,
}

impl Call {
    /// Create a new call.
    #[must_use]
    pub fn new(
        request: WireRequest,
        client_name: impl Into<String>,
        path: impl Into<String>,
        timeout: Timeout,
    ) -> Self {
        Self {
            request,
            client_name: client_name.into(),
            path: path.into(),
            timeout,
        }
    }
}

/// Type-erased service handling a [`Call`].
pub type Handler = BoxCloneService<Call, WireResponse, Error>;

/// Future type for [`Handler`] implementations.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<WireResponse>> + Send + 'static>>;

type WrapFn = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;
type InitFn = Arc<dyn Fn() -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A function `Handler -> Handler`, with an optional async initializer.
///
/// Build one from any [`tower::Layer`] over [`Handler`] with
/// [`Middleware::from_layer`], or from a closure with [`Middleware::from_fn`].
#[derive(Clone)]
pub struct Middleware {
    wrap: WrapFn,
    initializer: Option<InitFn>,
}

impl Middleware {
    /// Wrap handlers with a tower layer.
    pub fn from_layer<L>(layer: L) -> Self
    where
        L: Layer<Handler> + Send + Sync + 'static,
        L::Service: Service<Call, Response = WireResponse, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Call>>::Future: Send + 'static,
    {
        Self {
            wrap: Arc::new(move |next| BoxCloneService::new(layer.layer(next))),
            initializer: None,
        }
    }

    /// Wrap handlers with a plain function.
    ///
    /// ```ignore
    /// use rivet::{Call, Handler, Middleware};
    /// use tower::ServiceExt;
    /// use tower::util::BoxCloneService;
    ///
    /// let tagging = Middleware::from_fn(|next: Handler| {
    ///     BoxCloneService::new(tower::service_fn(move |mut call: Call| {
    ///         call.request.insert_header("X-Tag", "rivet");
    ///         next.clone().oneshot(call)
    ///     }))
    /// });
    /// ```
    pub fn from_fn<F>(wrap: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        Self {
            wrap: Arc::new(wrap),
            initializer: None,
        }
    }

    /// Attach an async initializer, run by
    /// [`ClientFactory::initialize`](crate::ClientFactory::initialize).
    #[must_use]
    pub fn with_initializer<F, Fut>(mut self, init: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.initializer = Some(Arc::new(move || -> BoxFuture<'static, Result<()>> {
            Box::pin(init())
        }));
        self
    }

    /// Wrap a handler.
    #[must_use]
    pub fn wrap(&self, next: Handler) -> Handler {
        (self.wrap)(next)
    }

    /// Run the initializer, if any.
    pub async fn initialize(&self) -> Result<()> {
        match &self.initializer {
            Some(init) => init().await,
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Middleware")
            .field("has_initializer", &self.initializer.is_some())
            .finish_non_exhaustive()
    }
}

/// Fold `middlewares` around `terminal`: `h[i+1] = middlewares[i](h[i])`.
#[must_use]
pub fn compose(middlewares: &[Middleware], terminal: Handler) -> Handler {
    middlewares
        .iter()
        .fold(terminal, |handler, middleware| middleware.wrap(handler))
}

/// Terminal handler sending the call through a [`Transport`].
pub struct TransportService<T> {
    transport: Arc<T>,
}

impl<T> TransportService<T> {
    /// Create a terminal handler over a transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }
}

impl<T> Clone for TransportService<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> Service<Call> for TransportService<T> {
    type Response = WireResponse;
    type Error = Error;
    type Future = HandlerFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: Call) -> Self::Future {
        let transport = Arc::clone(&self.transport);
        Box::pin(async move {
            let method = call.request.method();
            transport.send(method, call.request, call.timeout).await
        })
    }
}

/// Thread-safe holder of a [`Handler`].
///
/// [`BoxCloneService`] is `Send` but not `Sync`; this wrapper hands out
/// clones under a lock so proxies can be shared across tasks.
#[derive(Clone)]
pub(crate) struct SharedHandler {
    inner: Arc<Mutex<Handler>>,
}

impl SharedHandler {
    pub(crate) fn new(handler: Handler) -> Self {
        Self {
            inner: Arc::new(Mutex::new(handler)),
        }
    }

    pub(crate) fn get(&self) -> Handler {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for SharedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedHandler")
    }
}
