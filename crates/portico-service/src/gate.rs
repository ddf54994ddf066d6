//! Per-request credential gate for backend services.
//!
//! [`authenticate`] runs on every route except the public ones: it reads the
//! bearer credential, verifies it and stores the [`Claims`] in the request
//! extensions. [`require_role`] is layered on individual routes afterwards.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use portico_core::{Claims, CredentialCodec, Role, permits};

/// Paths every backend serves without a credential.
pub const PROBE_PATHS: [&str; 3] = ["/health", "/ready", "/api-docs/openapi.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GateRejection {
    #[error("missing credential")]
    MissingCredential,

    #[error("invalid credential")]
    InvalidCredential,

    #[error("insufficient role")]
    InsufficientRole,
}

impl GateRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            GateRejection::MissingCredential | GateRejection::InvalidCredential => StatusCode::UNAUTHORIZED,
            GateRejection::InsufficientRole => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Clone)]
pub struct Gate {
    codec: Arc<CredentialCodec>,
    public_paths: Arc<Vec<String>>,
}

impl Gate {
    pub fn new(codec: Arc<CredentialCodec>) -> Self {
        Self {
            codec,
            public_paths: Arc::new(PROBE_PATHS.iter().map(|p| p.to_string()).collect()),
        }
    }

    /// Serve `path` without a credential.
    pub fn allow_public(mut self, path: &str) -> Self {
        Arc::make_mut(&mut self.public_paths).push(path.to_string());
        self
    }

    pub fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| p == path)
    }
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is
/// matched case-insensitively.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn authenticate(
    State(gate): State<Gate>,
    mut req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    if gate.is_public(req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let token = bearer_token(req.headers()).ok_or(GateRejection::MissingCredential)?;
    let claims = gate
        .codec
        .verify(token)
        .map_err(|_| GateRejection::InvalidCredential)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Route-level role check; expects [`authenticate`] to have run.
pub async fn require_role(
    State(required): State<Role>,
    req: Request,
    next: Next,
) -> Result<Response, GateRejection> {
    let claims = req
        .extensions()
        .get::<Claims>()
        .ok_or(GateRejection::MissingCredential)?;

    if !permits(&claims.role, &required) {
        tracing::info!(user = %claims.username, role = %claims.role, required = %required, "role check failed");
        return Err(GateRejection::InsufficientRole);
    }
    Ok(next.run(req).await)
}
