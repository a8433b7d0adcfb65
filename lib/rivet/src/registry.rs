//! Explicit registry of clients, their service and their resources.

use std::collections::HashMap;

use rivet_core::{Error, Result, RouteKind};

use crate::contract::ResourceContract;

/// A route path template and its contract.
#[derive(Debug, Clone)]
pub struct Route {
    /// Path template relative to the service endpoint, e.g. `/items/{item_name}`.
    pub path: String,
    /// Methods accepted on the path.
    pub contract: ResourceContract,
}

/// Resource and collection routes of one resource.
#[derive(Debug, Clone, Default)]
pub struct ResourceRoutes {
    /// Route of a single resource.
    pub resource: Option<Route>,
    /// Route of the collection.
    pub collection: Option<Route>,
}

impl ResourceRoutes {
    /// Route of the given kind, if registered.
    #[must_use]
    pub const fn route(&self, kind: RouteKind) -> Option<&Route> {
        match kind {
            RouteKind::Resource => self.resource.as_ref(),
            RouteKind::Collection => self.collection.as_ref(),
        }
    }
}

/// One resource registration.
///
/// ```ignore
/// let registration = Registration::new("catalog", "item", "catalog-service")
///     .version("v1")
///     .resource("/items/{item_name}", item_contract)
///     .collection("/items", items_contract);
/// ```
#[derive(Debug, Clone)]
pub struct Registration {
    client: String,
    resource: String,
    service: String,
    version: Option<String>,
    routes: ResourceRoutes,
}

impl Registration {
    /// Register `resource` on `client`, served by `service`.
    #[must_use]
    pub fn new(
        client: impl Into<String>,
        resource: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            client: client.into(),
            resource: resource.into(),
            service: service.into(),
            version: None,
            routes: ResourceRoutes::default(),
        }
    }

    /// Set the service version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the resource route.
    #[must_use]
    pub fn resource(mut self, path: impl Into<String>, contract: ResourceContract) -> Self {
        self.routes.resource = Some(Route {
            path: path.into(),
            contract,
        });
        self
    }

    /// Set the collection route.
    #[must_use]
    pub fn collection(mut self, path: impl Into<String>, contract: ResourceContract) -> Self {
        self.routes.collection = Some(Route {
            path: path.into(),
            contract,
        });
        self
    }
}

/// A registered client: its service and resources.
#[derive(Debug, Clone)]
pub struct ClientRegistration {
    name: String,
    service: String,
    version: Option<String>,
    resources: HashMap<String, ResourceRoutes>,
}

impl ClientRegistration {
    /// Client name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Service the client talks to.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Service version, if any.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Routes of a resource.
    pub fn resource(&self, name: &str) -> Result<&ResourceRoutes> {
        self.resources
            .get(name)
            .ok_or_else(|| Error::UnregisteredResource {
                client: self.name.clone(),
                resource: name.to_string(),
            })
    }

    /// Registered resource names.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }
}

/// Registry of clients, owned by the composition root and handed to the
/// [`ClientFactory`](crate::ClientFactory).
#[derive(Debug, Clone, Default)]
pub struct Registry {
    clients: HashMap<String, ClientRegistration>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource registration.
    ///
    /// Registering a resource twice replaces it. A client bound to a
    /// different service or version is a configuration error.
    pub fn register(&mut self, registration: Registration) -> Result<()> {
        let Registration {
            client,
            resource,
            service,
            version,
            routes,
        } = registration;

        let entry = self
            .clients
            .entry(client.clone())
            .or_insert_with(|| ClientRegistration {
                name: client.clone(),
                service: service.clone(),
                version: version.clone(),
                resources: HashMap::new(),
            });

        if entry.service != service || entry.version != version {
            return Err(Error::configuration(format!(
                "client '{client}' is bound to service '{}', cannot register '{resource}' on '{service}'",
                entry.service
            )));
        }

        tracing::debug!(%client, %resource, %service, "resource registered");
        entry.resources.insert(resource, routes);
        Ok(())
    }

    /// Builder-style [`Registry::register`].
    pub fn with(mut self, registration: Registration) -> Result<Self> {
        self.register(registration)?;
        Ok(self)
    }

    /// Look up a client.
    pub fn client(&self, name: &str) -> Result<&ClientRegistration> {
        self.clients
            .get(name)
            .ok_or_else(|| Error::UnregisteredClient(name.to_string()))
    }
}
