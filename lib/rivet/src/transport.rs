//! Transport boundary and its hyper-util implementation.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rivet_core::{Error, HttpError, Method, Result, Timeout, WireRequest, WireResponse};

use crate::config::TransportConfig;
use crate::connector::https_connector;

/// Sends a [`WireRequest`] over the network.
///
/// Implementations must fail with [`Error::Timeout`] on connect or read
/// timeout and with [`Error::Http`] on any non-2xx status. A 2xx response,
/// including 204, is never an error; an empty body is JSON `null`.
///
/// `timeout.request` bounds the whole exchange, body included. How
/// `timeout.connect` is honored is up to the implementation: see
/// [`HyperTransport`].
pub trait Transport: Send + Sync + 'static {
    /// Send a request and wait for the whole response.
    fn send(
        &self,
        method: Method,
        request: WireRequest,
        timeout: Timeout,
    ) -> impl Future<Output = Result<WireResponse>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        method: Method,
        request: WireRequest,
        timeout: Timeout,
    ) -> impl Future<Output = Result<WireResponse>> + Send {
        (**self).send(method, request, timeout)
    }
}

/// HTTP transport using hyper-util with connection pooling and rustls.
///
/// The connect timeout is a property of the pooled connector: it comes from
/// [`TransportConfig::connect_timeout`] and the per-call
/// [`Timeout::connect`] is not used. The per-call request timeout still
/// bounds the connect phase, since it covers the whole exchange.
///
/// # Example
///
/// ```ignore
/// use rivet::{HyperTransport, TransportConfig};
/// use std::time::Duration;
///
/// let transport = HyperTransport::with_config(
///     TransportConfig::builder()
///         .connect_timeout(Duration::from_secs(2))
///         .build(),
/// );
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: TransportConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    /// Create a transport with custom configuration.
    #[must_use]
    pub fn with_config(config: TransportConfig) -> Self {
        let connector = https_connector(config.connect_timeout);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Self { inner, config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn build_hyper_request(
        method: Method,
        request: &WireRequest,
        url: &url::Url,
    ) -> Result<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(Full::new(request.body().clone()))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Extract response headers, joining repeated fields with `", "`.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        let mut extracted = HashMap::<String, String>::new();
        for name in headers.keys() {
            let values = headers
                .get_all(name)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .collect::<Vec<_>>();
            if !values.is_empty() {
                extracted.insert(name.to_string(), values.join(", "));
            }
        }
        extracted
    }

    async fn execute(
        &self,
        method: Method,
        request: WireRequest,
        timeout: Timeout,
    ) -> Result<WireResponse> {
        let url = url::Url::parse(&request.full_url())?;
        let hyper_request = Self::build_hyper_request(method, &request, &url)?;

        let exchange = async {
            let response = self
                .inner
                .request(hyper_request)
                .await
                .map_err(|err| self.map_hyper_error(&err, &url))?;

            let status = response.status().as_u16();
            let headers = Self::extract_headers(response.headers());

            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| Error::connection(e.to_string()))?
                .to_bytes();

            Ok::<_, Error>(WireResponse::from_bytes(status, headers, &body))
        };

        let response = tokio::time::timeout(timeout.request, exchange)
            .await
            .map_err(|_| Error::Timeout {
                url: url.to_string(),
                timeout: timeout.request,
            })??;

        if response.is_success() {
            Ok(response)
        } else {
            Err(HttpError::new(request, Some(response)).into())
        }
    }

    fn map_hyper_error(&self, err: &hyper_util::client::legacy::Error, url: &url::Url) -> Error {
        if err.is_connect() && Self::is_timed_out(err) {
            return Error::Timeout {
                url: url.to_string(),
                timeout: self.config.connect_timeout,
            };
        }
        Error::connection(err.to_string())
    }

    fn is_timed_out(err: &(dyn StdError + 'static)) -> bool {
        let mut source = err.source();
        while let Some(cause) = source {
            if cause
                .downcast_ref::<std::io::Error>()
                .is_some_and(|io| io.kind() == std::io::ErrorKind::TimedOut)
            {
                return true;
            }
            source = cause.source();
        }
        false
    }
}

impl Transport for HyperTransport {
    fn send(
        &self,
        method: Method,
        request: WireRequest,
        timeout: Timeout,
    ) -> impl Future<Output = Result<WireResponse>> + Send {
        self.execute(method, request, timeout)
    }
}
