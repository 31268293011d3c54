//! Product and user HTTP endpoints.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::services::catalog::{Product, User};
use crate::services::remote::{product_with_user, ProductWithUser};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/with-user", get(get_product_with_user))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
}

fn product_not_found(id: u64) -> ApiError {
    ApiError::NotFound(format!("product {id} not found"))
}

async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    Json(state.catalog.list())
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Product>, ApiError> {
    state.catalog.get(id).map(Json).ok_or_else(|| product_not_found(id))
}

async fn create_product(
    State(state): State<AppState>,
    Json(product): Json<Product>,
) -> (StatusCode, Json<Product>) {
    let product = state.catalog.create(product);
    tracing::info!(product_id = product.id, "Product created");
    (StatusCode::CREATED, Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(product): Json<Product>,
) -> Result<Json<Product>, ApiError> {
    state
        .catalog
        .update(id, product)
        .map(Json)
        .ok_or_else(|| product_not_found(id))
}

async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.catalog.delete(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(product_not_found(id))
    }
}

async fn get_product_with_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<ProductWithUser>, ApiError> {
    let composed = product_with_user(&state.catalog, &state.invoker, state.users.as_ref(), id).await?;
    Ok(Json(composed))
}

fn user_not_found(id: u64) -> ApiError {
    ApiError::NotFound(format!("user {id} not found"))
}

async fn list_users(State(state): State<AppState>) -> Json<Vec<User>> {
    Json(state.user_directory.list())
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<User>, ApiError> {
    state
        .user_directory
        .get(id)
        .map(Json)
        .ok_or_else(|| user_not_found(id))
}

async fn create_user(
    State(state): State<AppState>,
    Json(user): Json<User>,
) -> (StatusCode, Json<User>) {
    let user = state.user_directory.create(user);
    tracing::info!(user_id = user.id, "User created");
    (StatusCode::CREATED, Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(user): Json<User>,
) -> Result<Json<User>, ApiError> {
    state
        .user_directory
        .update(id, user)
        .map(Json)
        .ok_or_else(|| user_not_found(id))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    if state.user_directory.delete(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found(id))
    }
}
