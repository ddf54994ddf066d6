use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use portico_core::time::SystemClock;
use portico_core::{Claims, CredentialCodec, Role};
use portico_db::SqliteStore;
use portico_product::{ProductState, app};
use portico_registry::RegistrationState;
use serde_json::{Value, json};
use tower::ServiceExt;

struct Catalogue {
    app: Router,
    editor: String,
    reader: String,
}

fn catalogue() -> Catalogue {
    let codec = Arc::new(CredentialCodec::new(b"product-secret").unwrap());
    let token = |role| {
        codec
            .issue(&Claims::for_user(1, "ana", role, 60, &SystemClock))
            .unwrap()
    };
    let editor = token(Role::Editor);
    let reader = token(Role::User);
    let state = ProductState {
        store: Arc::new(SqliteStore::in_memory().unwrap()),
        codec: codec.clone(),
    };
    Catalogue {
        app: app(state, RegistrationState::default()),
        editor,
        reader,
    }
}

async fn call(app: &Router, method: &str, path: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(path)
        .header("authorization", format!("Bearer {token}"))
        .header("content-type", "application/json");
    let req = match body {
        Some(body) => req.body(Body::from(body.to_string())),
        None => req.body(Body::empty()),
    }
    .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn editor_manages_the_catalogue() {
    let c = catalogue();
    let (status, created) = call(
        &c.app,
        "POST",
        "/",
        &c.editor,
        Some(json!({ "name": "Widget", "description": "blue", "price": 2.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = call(&c.app, "PUT", &format!("/{id}"), &c.editor, Some(json!({ "price": 4.0 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 4.0);
    assert_eq!(updated["name"], "Widget");
    assert_eq!(updated["description"], "blue");

    let (status, listed) = call(&c.app, "GET", "/", &c.reader, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = call(&c.app, "DELETE", &format!("/{id}"), &c.editor, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&c.app, "GET", &format!("/{id}"), &c.reader, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "product not found" }));
}

#[tokio::test]
async fn readers_cannot_write() {
    let c = catalogue();
    let (status, body) = call(&c.app, "POST", "/", &c.reader, Some(json!({ "name": "Widget" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({ "error": "insufficient role" }));

    let (status, _) = call(&c.app, "DELETE", "/1", &c.reader, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn bad_ids_and_bodies_are_400() {
    let c = catalogue();
    let (status, body) = call(&c.app, "GET", "/abc", &c.reader, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid product id" }));

    let (status, _) = call(&c.app, "POST", "/", &c.editor, Some(json!({ "name": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&c.app, "PUT", "/7", &c.editor, Some(json!({ "price": 1.0 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn system_credential_reaches_health_but_not_products() {
    let codec = CredentialCodec::new(b"product-secret").unwrap();
    let system = codec
        .issue(&Claims::for_system("health_checker", 3600, &SystemClock))
        .unwrap();
    let c = catalogue();

    let (status, body) = call(&c.app, "GET", "/health", &system, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    let (status, _) = call(&c.app, "GET", "/", &system, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
