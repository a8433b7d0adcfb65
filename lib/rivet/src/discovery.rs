//! Service discovery: resolve a service name and version to an endpoint.

use std::collections::HashMap;

use futures_util::future::{self, BoxFuture};
use rivet_core::{Error, Result};

/// Resolves `(service, version)` to a base URL.
///
/// Fails with [`Error::UnregisteredService`] when the service is unknown.
pub trait ServiceDiscovery: Send + Sync + 'static {
    /// Resolve the endpoint of a service.
    fn resolve<'a>(&'a self, service: &'a str, version: Option<&'a str>)
    -> BoxFuture<'a, Result<String>>;
}

/// Discovery from an explicit endpoint table.
///
/// ```
/// use rivet::StaticDiscovery;
///
/// let discovery = StaticDiscovery::new()
///     .with_endpoint("catalog", Some("v1"), "http://catalog.local/v1")
///     .with_endpoint("billing", None, "http://billing.local");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    endpoints: HashMap<(String, Option<String>), String>,
}

impl StaticDiscovery {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint.
    #[must_use]
    pub fn with_endpoint(
        mut self,
        service: impl Into<String>,
        version: Option<&str>,
        endpoint: impl Into<String>,
    ) -> Self {
        self.endpoints.insert(
            (service.into(), version.map(str::to_string)),
            endpoint.into(),
        );
        self
    }

    fn lookup(&self, service: &str, version: Option<&str>) -> Result<String> {
        self.endpoints
            .get(&(service.to_string(), version.map(str::to_string)))
            .cloned()
            .ok_or_else(|| Error::unregistered_service(service, version))
    }
}

impl ServiceDiscovery for StaticDiscovery {
    fn resolve<'a>(
        &'a self,
        service: &'a str,
        version: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(future::ready(self.lookup(service, version)))
    }
}

/// Default router base URL.
pub const DEFAULT_ROUTER: &str = "http://router";

/// Passthrough discovery for services behind a routing proxy.
///
/// Formats `{base}/{service}-{version}/{version}`, or `{base}/{service}`
/// when unversioned. Never fails.
#[derive(Debug, Clone)]
pub struct RouterDiscovery {
    base: String,
}

impl Default for RouterDiscovery {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTER)
    }
}

impl RouterDiscovery {
    /// Route through `base`.
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, service: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}/{service}-{version}/{version}", self.base),
            None => format!("{}/{service}", self.base),
        }
    }
}

impl ServiceDiscovery for RouterDiscovery {
    fn resolve<'a>(
        &'a self,
        service: &'a str,
        version: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(future::ready(Ok(self.endpoint(service, version))))
    }
}
