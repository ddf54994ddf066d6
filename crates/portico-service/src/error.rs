use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use portico_core::{CodecError, StoreError};
use portico_registry::RegistryError;

/// Reasons a service refuses to start. There is no degraded mode for any
/// of them.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("signing secret unusable: {0}")]
    Secret(#[from] CodecError),

    #[error("registry client: {0}")]
    Registry(#[from] RegistryError),

    #[error("record store: {0}")]
    Store(#[from] StoreError),

    #[error("http client: {0}")]
    HttpClient(String),

    #[error("server i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors returned by business handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "request failed");
        }
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound("not found".into()),
            StoreError::Duplicate => ApiError::Conflict("already exists".into()),
            StoreError::Backend(detail) => ApiError::Internal(detail),
        }
    }
}
