use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portico_core::ServiceInstance;

use crate::EdgeState;
use crate::forward::ForwardError;

/// Failures the edge reports to the client. The text never includes
/// registry or transport error details.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("no route for {0}")]
    NoRoute(String),

    #[error("{0} unavailable")]
    Unavailable(String),

    #[error("{0} unreachable")]
    Unreachable(String),

    #[error("{0} timed out")]
    TimedOut(String),

    #[error("request body too large")]
    BodyTooLarge,

    #[error("request body could not be read")]
    BadBody,
}

impl EdgeError {
    pub fn status(&self) -> StatusCode {
        match self {
            EdgeError::NoRoute(_) => StatusCode::NOT_FOUND,
            EdgeError::Unavailable(_) | EdgeError::TimedOut(_) => StatusCode::SERVICE_UNAVAILABLE,
            EdgeError::Unreachable(_) => StatusCode::BAD_GATEWAY,
            EdgeError::BodyTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            EdgeError::BadBody => StatusCode::BAD_REQUEST,
        }
    }

    fn from_forward(service: &str, err: ForwardError) -> Self {
        match err {
            ForwardError::BodyTooLarge(_) => EdgeError::BodyTooLarge,
            ForwardError::Body => EdgeError::BadBody,
            ForwardError::Timeout(_) => EdgeError::TimedOut(service.to_string()),
            ForwardError::Connect(_) | ForwardError::Transport(_) => EdgeError::Unreachable(service.to_string()),
        }
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Instance selection: the first healthy entry in registry order. No
/// weighting or rotation.
pub fn select_instance(instances: &[ServiceInstance]) -> Option<&ServiceInstance> {
    instances.iter().find(|instance| instance.healthy)
}

fn record(service: &str, outcome: &'static str) {
    metrics::counter!("portico_edge_requests_total", "service" => service.to_string(), "outcome" => outcome)
        .increment(1);
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Fallback handler: everything that is not an edge-local route.
pub async fn route(State(state): State<EdgeState>, req: Request) -> Result<Response, EdgeError> {
    let path = req.uri().path().to_string();
    let rule = state
        .routes
        .resolve(&path)
        .ok_or_else(|| EdgeError::NoRoute(path.clone()))?;
    let service = rule.target_service.as_str();

    let instances = match state.registry.query(service).await {
        Ok(instances) => instances,
        Err(err) => {
            tracing::warn!(service, error = %err, "registry lookup failed");
            record(service, "registry_error");
            return Err(EdgeError::Unavailable(service.to_string()));
        }
    };
    let Some(instance) = select_instance(&instances) else {
        tracing::warn!(service, "no healthy instances registered");
        record(service, "no_instance");
        return Err(EdgeError::Unavailable(service.to_string()));
    };

    let downstream_path = rule.rewrite(&path);
    match state.forwarder.forward(req, instance, downstream_path).await {
        Ok(response) => {
            record(service, status_class(response.status()));
            Ok(response)
        }
        Err(err) => {
            tracing::warn!(service, instance = %instance.base_url(), error = %err, "forwarding failed");
            record(service, "forward_error");
            Err(EdgeError::from_forward(service, err))
        }
    }
}
