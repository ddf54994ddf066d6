use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use portico_core::{CredentialCodec, NewProduct, Product, ProductPatch, ProductStore, Role, StoreError};
use portico_registry::RegistrationState;
use portico_service::openapi::BearerSecurity;
use portico_service::{ApiError, Gate, authenticate, probes, require_role};
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct ProductState {
    pub store: Arc<dyn ProductStore>,
    pub codec: Arc<CredentialCodec>,
}

#[derive(OpenApi)]
#[openapi(
    paths(list_products, get_product, create_product, update_product, delete_product),
    components(schemas(Product, NewProduct, ProductPatch)),
    modifiers(&BearerSecurity)
)]
struct ApiDoc;

/// Reads need USER, writes need EDITOR. Every route sits behind the gate.
pub fn app(state: ProductState, registration: RegistrationState) -> Router {
    let readers = || middleware::from_fn_with_state(Role::User, require_role);
    let editors = || middleware::from_fn_with_state(Role::Editor, require_role);

    let collection = get(list_products)
        .route_layer(readers())
        .merge(post(create_product).route_layer(editors()));
    let item = get(get_product)
        .route_layer(readers())
        .merge(
            axum::routing::put(update_product)
                .delete(delete_product)
                .route_layer(editors()),
        );

    Router::new()
        .route("/", collection)
        .route("/:id", item)
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(probes::routes(registration))
        .layer(middleware::from_fn_with_state(Gate::new(state.codec.clone()), authenticate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn product_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid product id".into()))
}

fn not_found_or(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound => ApiError::NotFound("product not found".into()),
        other => other.into(),
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| ApiError::BadRequest("invalid request body".into()))
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "All products", body = [Product])),
    security(("bearer" = []))
)]
async fn list_products(State(state): State<ProductState>) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.store.list_products()?))
}

#[utoipa::path(
    get,
    path = "/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "The product", body = Product),
        (status = 400, description = "Id is not a number"),
        (status = 404, description = "No such product")
    ),
    security(("bearer" = []))
)]
async fn get_product(
    State(state): State<ProductState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id = product_id(&id)?;
    state.store.get_product(id).map(Json).map_err(not_found_or)
}

#[utoipa::path(
    post,
    path = "/",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Created", body = Product),
        (status = 400, description = "Missing name")
    ),
    security(("bearer" = []))
)]
async fn create_product(
    State(state): State<ProductState>,
    payload: Result<Json<NewProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let mut new_product = body(payload)?;
    new_product.name = new_product.name.trim().to_string();
    if new_product.name.is_empty() {
        return Err(ApiError::BadRequest("product name is required".into()));
    }

    let product = state
        .store
        .create_product(&new_product, state.codec.clock().now_secs())?;
    tracing::info!(product_id = product.id, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    put,
    path = "/{id}",
    params(("id" = i64, Path, description = "Product id")),
    request_body = ProductPatch,
    responses(
        (status = 200, description = "Updated", body = Product),
        (status = 404, description = "No such product")
    ),
    security(("bearer" = []))
)]
async fn update_product(
    State(state): State<ProductState>,
    Path(id): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> Result<Json<Product>, ApiError> {
    let id = product_id(&id)?;
    let patch = body(payload)?;
    state
        .store
        .update_product(id, &patch, state.codec.clock().now_secs())
        .map(Json)
        .map_err(not_found_or)
}

#[utoipa::path(
    delete,
    path = "/{id}",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "No such product")
    ),
    security(("bearer" = []))
)]
async fn delete_product(
    State(state): State<ProductState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = product_id(&id)?;
    state.store.delete_product(id).map_err(not_found_or)?;
    tracing::info!(product_id = id, "product deleted");
    Ok(Json(json!({ "message": "product deleted" })))
}
