//! Items API Example
//!
//! Demonstrates rivet's contract-driven clients against an items catalog.
//!
//! Set `ITEMS_API_URL` to call a running service directly; otherwise the
//! endpoint is resolved through the default router.

// Example-specific lint allowances
#![allow(missing_docs)]
#![allow(clippy::print_stdout)]

use std::time::Duration;

use rivet::middleware::{CircuitMetricsListener, MetricsLayer};
use rivet::prelude::*;
use rivet::{RouteProxy, ServiceDiscovery, StaticDiscovery};

// ============================================================================
// Data Types
// ============================================================================

/// An item of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub price: Option<u32>,
}

/// `GET /items/{item_name}`
#[derive(Debug, Request, Deserialize)]
pub struct GetItem {
    #[field(path)]
    pub item_name: String,
}

/// `GET /items?limit=..&tag=..`
#[derive(Debug, Default, Request, Deserialize)]
pub struct ListItems {
    #[field(query)]
    pub limit: Option<u32>,
    #[field(query)]
    #[serde(default)]
    pub tag: Vec<String>,
}

/// `POST /items`
#[derive(Debug, Request, Deserialize)]
pub struct CreateItem {
    pub name: String,
    pub price: u32,
    #[field(header, rename = "X-Request-Id")]
    pub request_id: Option<String>,
}

// ============================================================================
// Wiring
// ============================================================================

/// Registry with the `catalog` client and its `item` resource.
pub fn registry() -> Result<Registry> {
    Registry::new().with(
        Registration::new("catalog", "item", "items-api")
            .version("v1")
            .resource(
                "/items/{item_name}",
                ResourceContract::new().route::<GetItem, Item>(Method::Get),
            )
            .collection(
                "/items",
                ResourceContract::new()
                    .route::<ListItems, Item>(Method::Get)
                    .route::<CreateItem, Item>(Method::Post),
            ),
    )
}

/// Factory with caching, circuit breaking, metrics and logging.
pub fn catalog_factory(discovery: impl ServiceDiscovery) -> Result<ClientFactory> {
    Ok(
        ClientFactory::new(registry()?, discovery, HyperTransport::new())
            .with_timeout(Duration::from_secs(5))
            .add_middleware(CacheLayer::new(InMemoryCacheStore::new()))
            .add_middleware(
                CircuitBreakerLayer::new(CircuitBreakerConfig::default())
                    .with_listener(CircuitMetricsListener),
            )
            .add_middleware(MetricsLayer::new())
            .add_middleware(LoggingLayer::new()),
    )
}

// ============================================================================
// Main: Demonstrate usage
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let factory = match std::env::var("ITEMS_API_URL") {
        Ok(url) => catalog_factory(StaticDiscovery::new().with_endpoint("items-api", Some("v1"), url))?,
        Err(_) => catalog_factory(RouterDiscovery::default())?,
    };
    factory.initialize().await?;

    let catalog = factory.client("catalog").await?;
    println!("Catalog client created on {}", catalog.endpoint());

    let items = catalog.resource("item")?;

    match items
        .get::<Item>(GetItem {
            item_name: "foo".to_string(),
        })
        .await?
        .into_result()?
    {
        Ok(item) => println!("Found {item:?}"),
        Err(error) => println!("Lookup failed: {error}"),
    }

    match items
        .collection_get::<Item>(ListItems {
            limit: Some(10),
            ..ListItems::default()
        })
        .await?
    {
        Ok(list) => {
            println!("{} items (total: {:?})", list.meta().count, list.meta().total_count);
            for item in list {
                println!("  - {}", item?.name);
            }
        }
        Err(error) => println!("Listing failed: {error}"),
    }

    Ok(())
}

// ============================================================================
// Tests using wiremock
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    async fn items(server: &MockServer) -> RouteProxy {
        let discovery = StaticDiscovery::new().with_endpoint("items-api", Some("v1"), server.uri());
        catalog_factory(discovery)
            .expect("factory")
            .client("catalog")
            .await
            .expect("client")
            .resource("item")
            .expect("resource")
    }

    #[tokio::test]
    async fn test_get_item_is_cached() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items/foo"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Cache-Control", "public, max-age=300")
                    .set_body_json(serde_json::json!({ "name": "foo", "price": 3 })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let items = items(&mock_server).await;
        for _ in 0..2 {
            let item: Item = items
                .get::<Item>(GetItem {
                    item_name: "foo".to_string(),
                })
                .await
                .expect("call")
                .unwrap()
                .expect("item");
            assert_eq!(item.price, Some(3));
        }
    }

    #[tokio::test]
    async fn test_list_items() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("limit", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Total-Count", "7")
                    .set_body_json(serde_json::json!([
                        { "name": "foo", "price": 3 },
                        { "name": "bar", "price": null }
                    ])),
            )
            .mount(&mock_server)
            .await;

        let list = items(&mock_server)
            .await
            .collection_get::<Item>(ListItems {
                limit: Some(2),
                ..ListItems::default()
            })
            .await
            .expect("call")
            .expect("success");

        assert_eq!(list.meta().total_count, Some(7));
        let items = list.collect::<Result<Vec<Item>>>().expect("items");
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_create_item() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/items"))
            .and(header("X-Request-Id", "req-1"))
            .and(body_json(serde_json::json!({ "name": "baz", "price": 12 })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({ "name": "baz", "price": 12 })),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let created: Item = items(&mock_server)
            .await
            .collection_post::<Item>(CreateItem {
                name: "baz".to_string(),
                price: 12,
                request_id: Some("req-1".to_string()),
            })
            .await
            .expect("call")
            .unwrap()
            .expect("item");

        assert_eq!(created.name, "baz");
    }
}
