use crate::dtos::ProductRequest;
use crate::middleware::AuthenticatedUser;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let products = state.products.list_products().await?;
    Ok(Json(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.get_product(product_id).await?;
    Ok(Json(product))
}

pub async fn create_product(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let product = state.products.create_product(req.into()).await?;
    tracing::info!(
        product_id = %product.product_id,
        user_id = %user_id,
        "Product created"
    );
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(product_id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<impl IntoResponse, AppError> {
    let product = state
        .products
        .update_product(product_id, req.into())
        .await?;
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.products.delete_product(product_id).await?;
    tracing::info!(product_id = %product_id, user_id = %user_id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}
