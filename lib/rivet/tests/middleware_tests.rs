//! Integration tests for middleware running through a client factory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use rivet::middleware::{
    AddHeadersLayer, AuthorizationLayer, CacheLayer, CircuitBreakerConfig, CircuitBreakerLayer,
    CircuitState, InMemoryCacheStore, LoggingLayer,
};
use rivet::tower::ServiceExt;
use rivet::tower::util::BoxCloneService;
use rivet::{
    Call, ClientFactory, Error, Handler, HyperTransport, Method, Middleware, Registration,
    Registry, Request, ResourceContract, RouteProxy, StaticDiscovery,
};
use serde::Deserialize;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
}

#[derive(Debug, Request, Deserialize)]
struct GetItem {
    #[field(path)]
    item_name: String,
}

fn get_item(name: &str) -> GetItem {
    GetItem {
        item_name: name.to_string(),
    }
}

fn factory(server: &MockServer) -> ClientFactory {
    let registry = Registry::new()
        .with(
            Registration::new("catalog", "item", "catalog-service").resource(
                "/items/{item_name}",
                ResourceContract::new().route::<GetItem, Item>(Method::Get),
            ),
        )
        .expect("registry");
    let discovery = StaticDiscovery::new().with_endpoint("catalog-service", None, server.uri());
    ClientFactory::new(registry, discovery, HyperTransport::new())
}

async fn items(factory: &ClientFactory) -> RouteProxy {
    factory
        .client("catalog")
        .await
        .expect("client")
        .resource("item")
        .expect("resource")
}

/// Appends its name to the `X-Order` header.
fn tag(name: &'static str) -> Middleware {
    Middleware::from_fn(move |next: Handler| {
        BoxCloneService::new(rivet::tower::service_fn(move |mut call: Call| {
            let order = match call.request.header("X-Order") {
                Some(previous) => format!("{previous}|{name}"),
                None => name.to_string(),
            };
            call.request.insert_header("X-Order", order);
            next.clone().oneshot(call)
        }))
    })
}

/// Test that the middleware added last is the innermost one.
#[tokio::test]
async fn test_middleware_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .and(header("X-Order", "A|B|C"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "foo" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let factory = factory(&mock_server)
        .add_middleware(tag("A"))
        .add_middleware(tag("B"))
        .add_middleware(tag("C"));

    let response = items(&factory).await.get::<Item>(get_item("foo")).await.expect("call");

    assert!(response.is_ok());
}

/// Test that client-level middleware does not leak into other clients.
#[tokio::test]
async fn test_client_middleware_is_local() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .and(header("X-Order", "factory|client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "tagged" })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .and(header("X-Order", "factory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "plain" })))
        .mount(&mock_server)
        .await;

    let factory = factory(&mock_server).add_middleware(tag("factory"));
    let tagged = factory
        .client("catalog")
        .await
        .expect("client")
        .add_middleware(tag("client"))
        .resource("item")
        .expect("resource");
    let plain = items(&factory).await;

    let tagged: Item = tagged
        .get::<Item>(get_item("foo"))
        .await
        .expect("call")
        .unwrap()
        .expect("item");
    let plain: Item = plain
        .get::<Item>(get_item("foo"))
        .await
        .expect("call")
        .unwrap()
        .expect("item");

    assert_eq!(tagged.name, "tagged");
    assert_eq!(plain.name, "plain");
}

/// Test that auth and fixed headers reach the server.
#[tokio::test]
async fn test_header_middlewares() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .and(header("Authorization", "Bearer my-secret-token"))
        .and(header("User-Agent", "catalog-sync/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "name": "foo" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let factory = factory(&mock_server)
        .add_middleware(AuthorizationLayer::bearer("my-secret-token"))
        .add_middleware(AddHeadersLayer::new([("User-Agent", "catalog-sync/1.0")]))
        .add_middleware(LoggingLayer::debug());

    let response = items(&factory).await.get::<Item>(get_item("foo")).await.expect("call");

    assert!(response.is_ok());
}

/// Test that a public response is fetched once.
#[tokio::test]
async fn test_cache_short_circuits() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "max-age=60, public")
                .set_body_json(serde_json::json!({ "name": "foo" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let factory = factory(&mock_server).add_middleware(CacheLayer::new(InMemoryCacheStore::new()));
    factory.initialize().await.expect("initialize");
    let items = items(&factory).await;

    for _ in 0..3 {
        let item: Item = items
            .get::<Item>(get_item("foo"))
            .await
            .expect("call")
            .unwrap()
            .expect("item");
        assert_eq!(item.name, "foo");
    }
}

/// Test that `Cache-Control` split over several header lines is honored.
#[tokio::test]
async fn test_cache_reads_repeated_cache_control() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("Cache-Control", "public")
                .append_header("Cache-Control", "max-age=60")
                .set_body_json(serde_json::json!({ "name": "foo" })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = InMemoryCacheStore::new();
    let factory = factory(&mock_server).add_middleware(CacheLayer::new(store.clone()));
    let items = items(&factory).await;

    for _ in 0..2 {
        let item: Item = items
            .get::<Item>(get_item("foo"))
            .await
            .expect("call")
            .unwrap()
            .expect("item");
        assert_eq!(item.name, "foo");
    }
    assert_eq!(store.len(), 2);
}

/// Test that a response without `public` is never stored.
#[tokio::test]
async fn test_cache_skips_private_responses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "max-age=60")
                .set_body_json(serde_json::json!({ "name": "foo" })),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let store = InMemoryCacheStore::new();
    let factory = factory(&mock_server).add_middleware(CacheLayer::new(store.clone()));
    let items = items(&factory).await;

    items.get::<Item>(get_item("foo")).await.expect("first call");
    items.get::<Item>(get_item("foo")).await.expect("second call");

    assert!(store.is_empty());
}

/// Test that the breaker opens after the threshold and rejects calls.
#[tokio::test]
async fn test_circuit_breaker_opens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/foo"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let breaker = CircuitBreakerLayer::new(
        CircuitBreakerConfig::default()
            .with_threshold(2)
            .with_ttl(Duration::from_secs(60)),
    );
    let factory = factory(&mock_server).add_middleware(breaker.clone());
    let items = items(&factory).await;

    for _ in 0..2 {
        let response = items.get::<Item>(get_item("foo")).await.expect("call");
        assert_eq!(response.http_error().and_then(|e| e.status()), Some(503));
    }
    assert_eq!(breaker.state("catalog"), Some(CircuitState::Open));

    let rejected = items.get::<Item>(get_item("foo")).await;
    assert!(matches!(
        rejected,
        Err(Error::CircuitOpen { client_name }) if client_name == "catalog"
    ));
}

/// Test that 4xx responses never open the breaker.
#[tokio::test]
async fn test_circuit_breaker_ignores_client_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/items/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(5)
        .mount(&mock_server)
        .await;

    let breaker = CircuitBreakerLayer::new(CircuitBreakerConfig::default().with_threshold(2));
    let factory = factory(&mock_server).add_middleware(breaker.clone());
    let items = items(&factory).await;

    for _ in 0..5 {
        let response = items.get::<Item>(get_item("missing")).await.expect("call");
        assert!(response.is_err());
    }

    let record = breaker.record("catalog").expect("record");
    assert_eq!(record.state, CircuitState::Closed);
    assert_eq!(record.failure_count, 0);
}

/// Test that initializers run once however often `initialize` is called.
#[tokio::test]
async fn test_initialize_runs_once() {
    let mock_server = MockServer::start().await;
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);

    let factory = factory(&mock_server).add_middleware(tag("init").with_initializer(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    factory.initialize().await.expect("first");
    factory.initialize().await.expect("second");

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Test that concurrent `initialize` calls share a single run.
#[tokio::test]
async fn test_concurrent_initialize_runs_once() {
    let mock_server = MockServer::start().await;
    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);

    let factory = factory(&mock_server).add_middleware(tag("init").with_initializer(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        }
    }));

    let (first, second) = tokio::join!(factory.initialize(), factory.initialize());
    first.expect("first");
    second.expect("second");

    assert_eq!(runs.load(Ordering::SeqCst), 1);
}
