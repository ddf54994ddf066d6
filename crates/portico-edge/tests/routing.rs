use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use portico_core::{RouteRule, RouteTable, ServiceInstance};
use portico_edge::{EdgeState, Forwarder, app};
use portico_registry::InMemoryRegistry;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn edge(registry: Arc<InMemoryRegistry>, timeout: Duration) -> Router {
    let state = EdgeState {
        routes: Arc::new(RouteTable::new(vec![
            "/auth=identity".parse().unwrap(),
            "/products=product".parse().unwrap(),
            RouteRule::new("/legacy", "product", false),
        ])),
        registry,
        forwarder: Forwarder::new(timeout, Duration::from_secs(1), 1024).unwrap(),
    };
    app(state, None)
}

fn register(registry: &InMemoryRegistry, server: &MockServer) {
    let addr: &SocketAddr = server.address();
    registry.insert(ServiceInstance::new("product", addr.ip().to_string(), addr.port()));
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forwards_with_prefix_stripped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/42"))
        .and(header("authorization", "Bearer t"))
        .and(body_string("{\"name\":\"Widget\"}"))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("x-product-id", "42")
                .set_body_string("created"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);

    let req = Request::builder()
        .method("POST")
        .uri("/products/42")
        .header("authorization", "Bearer t")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\":\"Widget\"}"))
        .unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.headers()["x-product-id"], "42");
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"created");
}

#[tokio::test]
async fn bare_prefix_becomes_root_and_query_survives() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);

    let req = Request::builder().uri("/products?page=2").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn keep_rule_forwards_full_encoded_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/legacy/a%20b"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);

    let req = Request::builder().uri("/legacy/a%20b").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn no_healthy_instance_is_503_without_forwarding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);
    let addr = server.address();
    registry.set_health("product", &addr.ip().to_string(), addr.port(), false);

    let req = Request::builder().uri("/products/42").body(Body::empty()).unwrap();
    let res = edge(registry.clone(), Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(res).await, json!({ "error": "product unavailable" }));
    assert_eq!(registry.query_count(), 1);
}

#[tokio::test]
async fn unreachable_registry_is_503() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.set_reachable(false);

    let req = Request::builder().uri("/auth/login").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(res).await, json!({ "error": "identity unavailable" }));
}

#[tokio::test]
async fn unmatched_path_is_404() {
    let registry = Arc::new(InMemoryRegistry::new());
    let req = Request::builder().uri("/orders/1").body(Body::empty()).unwrap();
    let res = edge(registry.clone(), Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(registry.query_count(), 0);
}

#[tokio::test]
async fn refused_connection_is_502_without_details() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(ServiceInstance::new("product", "127.0.0.1", 1));

    let req = Request::builder().uri("/products/1").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(res).await, json!({ "error": "product unreachable" }));
}

#[tokio::test]
async fn hung_downstream_times_out_as_503() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);

    let req = Request::builder().uri("/products/1").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_millis(200)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(res).await, json!({ "error": "product timed out" }));
}

#[tokio::test]
async fn oversized_body_is_refused() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.insert(ServiceInstance::new("product", "127.0.0.1", 1));

    let req = Request::builder()
        .method("POST")
        .uri("/products")
        .header("content-length", "4096")
        .body(Body::from(vec![0u8; 4096]))
        .unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn oversized_body_without_length_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let registry = Arc::new(InMemoryRegistry::new());
    register(&registry, &server);

    let req = Request::builder()
        .method("POST")
        .uri("/products")
        .body(Body::from(vec![0u8; 4096]))
        .unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(res).await, json!({ "error": "request body too large" }));
}

#[tokio::test]
async fn edge_health_needs_nothing() {
    let registry = Arc::new(InMemoryRegistry::new());
    registry.set_reachable(false);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let res = edge(registry, Duration::from_secs(5)).oneshot(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({ "status": "ok" }));
}
