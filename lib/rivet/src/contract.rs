//! Resource contracts: which methods a route accepts, with which schemas.

use std::collections::BTreeMap;

use rivet_core::{Method, RequestSchema, RequestSchemaInfo, ResponseSchemaInfo, RouteSchema};
use serde::de::DeserializeOwned;

/// Mapping from HTTP method to request and response schema for one route.
///
/// A method absent from the contract is an error at call time, not at
/// registration time.
///
/// # Example
///
/// ```ignore
/// let contract = ResourceContract::new()
///     .route::<GetItem, Item>(Method::Get)
///     .route_without_response::<DeleteItem>(Method::Delete);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourceContract {
    routes: BTreeMap<Method, RouteSchema>,
}

impl ResourceContract {
    /// Create an empty contract.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `method` with request schema `Req` and response schema `Resp`.
    #[must_use]
    pub fn route<Req, Resp>(mut self, method: Method) -> Self
    where
        Req: RequestSchema + DeserializeOwned,
        Resp: DeserializeOwned + 'static,
    {
        self.routes.insert(
            method,
            RouteSchema {
                request: RequestSchemaInfo::of::<Req>(),
                response: Some(ResponseSchemaInfo::of::<Resp>()),
            },
        );
        self
    }

    /// Declare `method` with request schema `Req` and no response schema.
    #[must_use]
    pub fn route_without_response<Req>(mut self, method: Method) -> Self
    where
        Req: RequestSchema + DeserializeOwned,
    {
        self.routes.insert(
            method,
            RouteSchema {
                request: RequestSchemaInfo::of::<Req>(),
                response: None,
            },
        );
        self
    }

    /// Schemas declared for `method`.
    #[must_use]
    pub fn get(&self, method: Method) -> Option<&RouteSchema> {
        self.routes.get(&method)
    }

    /// Declared methods, in order.
    pub fn methods(&self) -> impl Iterator<Item = Method> + '_ {
        self.routes.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use rivet_core::NoParams;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Item {
        #[allow(dead_code)]
        name: String,
    }

    #[test]
    fn declared_methods_only() {
        let contract = ResourceContract::new()
            .route::<NoParams, Item>(Method::Get)
            .route_without_response::<NoParams>(Method::Delete);

        let get = contract.get(Method::Get).expect("get");
        assert!(get.response.is_some());
        assert!(contract.get(Method::Delete).expect("delete").response.is_none());
        assert!(contract.get(Method::Post).is_none());
        assert_eq!(
            contract.methods().collect::<Vec<_>>(),
            vec![Method::Get, Method::Delete]
        );
    }
}
