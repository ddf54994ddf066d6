use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use portico_registry::RegistrationState;
use serde_json::{Value, json};

/// Liveness only. Never touches business data.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn ready(State(registration): State<RegistrationState>) -> (StatusCode, Json<Value>) {
    if registration.is_registered() {
        (StatusCode::OK, Json(json!({ "status": "registered" })))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "status": "not registered" })))
    }
}

/// `/health` and `/ready` for a backend service.
pub fn routes<S>(registration: RegistrationState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready).with_state(registration))
}
