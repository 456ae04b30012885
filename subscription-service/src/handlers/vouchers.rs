use crate::dtos::{ValidateVoucherRequest, ValidateVoucherResponse, VoucherRequest};
use crate::error::DomainError;
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

/// Public pre-checkout check. An unusable code is a normal answer
/// (`valid: false`), not an error status.
pub async fn validate_voucher(
    State(state): State<AppState>,
    Json(req): Json<ValidateVoucherRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = match state
        .vouchers
        .validate_voucher(&req.code, req.product_id)
        .await
    {
        Ok(validation) => ValidateVoucherResponse::valid(validation.voucher, validation.pricing),
        Err(
            e @ (DomainError::Voucher(_)
            | DomainError::VoucherNotFound
            | DomainError::ProductNotFound
            | DomainError::InactiveProduct),
        ) => ValidateVoucherResponse::invalid(e.to_string()),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(response))
}

pub async fn list_vouchers(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let vouchers = state.vouchers.list_active_vouchers().await?;
    Ok(Json(vouchers))
}

pub async fn list_vouchers_for_product(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let vouchers = state.vouchers.list_vouchers_for_product(product_id).await?;
    Ok(Json(vouchers))
}

pub async fn get_voucher(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let voucher = state.vouchers.get_voucher(voucher_id).await?;
    Ok(Json(voucher))
}

pub async fn create_voucher(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<VoucherRequest>,
) -> Result<impl IntoResponse, AppError> {
    let voucher = state.vouchers.create_voucher(req.into()).await?;
    tracing::info!(
        voucher_id = %voucher.voucher_id,
        code = %voucher.code,
        user_id = %user_id,
        "Voucher created"
    );
    Ok((StatusCode::CREATED, Json(voucher)))
}

pub async fn update_voucher(
    State(state): State<AppState>,
    AuthenticatedUser(_): AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
    Json(req): Json<VoucherRequest>,
) -> Result<impl IntoResponse, AppError> {
    let voucher = state
        .vouchers
        .update_voucher(voucher_id, req.into())
        .await?;
    Ok(Json(voucher))
}

pub async fn delete_voucher(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(voucher_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.vouchers.delete_voucher(voucher_id).await?;
    tracing::info!(voucher_id = %voucher_id, user_id = %user_id, "Voucher deleted");
    Ok(StatusCode::NO_CONTENT)
}
