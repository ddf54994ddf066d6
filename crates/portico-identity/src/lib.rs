//! Identity service: the only component that mints user credentials.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use portico_core::claims::INTERACTIVE_TTL_SECS;
use portico_core::{Claims, CredentialCodec, NewUser, Role, StoreError, User, UserStore};
use portico_registry::RegistrationState;
use portico_service::openapi::BearerSecurity;
use portico_service::{ApiError, Gate, authenticate, probes};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema};

pub mod password;

#[derive(Clone)]
pub struct IdentityState {
    pub store: Arc<dyn UserStore>,
    pub codec: Arc<CredentialCodec>,
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, validate),
    components(schemas(LoginRequest, RegisterRequest, TokenResponse, User)),
    modifiers(&BearerSecurity)
)]
struct ApiDoc;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ana")]
    pub username: String,
    #[schema(example = "correct horse")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "ana")]
    pub username: String,
    #[schema(example = "ana@example.com")]
    pub email: String,
    #[schema(example = "correct horse")]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    pub user: User,
}

pub fn app(state: IdentityState, registration: RegistrationState) -> Router {
    let gate = Gate::new(state.codec.clone())
        .allow_public("/login")
        .allow_public("/register");

    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/validate", get(validate))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(probes::routes(registration))
        .layer(middleware::from_fn_with_state(gate, authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn invalid_login() -> ApiError {
    ApiError::Unauthorized("invalid username or password".into())
}

#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credential issued", body = TokenResponse),
        (status = 401, description = "Unknown user or wrong password")
    )
)]
async fn login(
    State(state): State<IdentityState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;

    let user = match state.store.find_user_by_name(&req.username) {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            password::verify_decoy(&req.password);
            return Err(invalid_login());
        }
        Err(err) => return Err(err.into()),
    };
    if !password::verify_password(&req.password, &user.password_hash) {
        tracing::info!(username = %req.username, "login refused");
        return Err(invalid_login());
    }

    let claims = Claims::for_user(
        user.id,
        &user.username,
        user.role.clone(),
        INTERACTIVE_TTL_SECS,
        state.codec.clock(),
    );
    let token = state
        .codec
        .issue(&claims)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    tracing::info!(user_id = user.id, role = %user.role, "credential issued");
    Ok(Json(TokenResponse { token, user }))
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created with the USER role", body = User),
        (status = 400, description = "Missing fields"),
        (status = 409, description = "Username or email taken")
    )
)]
async fn register(
    State(state): State<IdentityState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(req) = payload.map_err(|_| ApiError::BadRequest("invalid request body".into()))?;
    if req.username.trim().is_empty() || req.password.is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("username, email and password are required".into()));
    }

    let password_hash =
        password::hash_password(&req.password).map_err(|e| ApiError::Internal(e.to_string()))?;
    // Self-registration always yields USER; elevation is an admin action.
    let new_user = NewUser {
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash,
        role: Role::User,
    };

    let user = match state.store.create_user(&new_user, state.codec.clock().now_secs()) {
        Ok(user) => user,
        Err(StoreError::Duplicate) => {
            return Err(ApiError::Conflict("username or email already exists".into()));
        }
        Err(err) => return Err(err.into()),
    };
    tracing::info!(user_id = user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}

#[utoipa::path(
    get,
    path = "/validate",
    responses(
        (status = 200, description = "Credential belongs to this user", body = User),
        (status = 401, description = "Missing, invalid or orphaned credential")
    ),
    security(("bearer" = []))
)]
async fn validate(
    State(state): State<IdentityState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let orphaned = || ApiError::Unauthorized("user not found".into());
    let id = claims.user_id().ok_or_else(orphaned)?;
    match state.store.get_user(id) {
        Ok(user) => Ok(Json(user)),
        Err(StoreError::NotFound) => Err(orphaned()),
        Err(err) => Err(err.into()),
    }
}
