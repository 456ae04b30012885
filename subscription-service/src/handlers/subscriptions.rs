use crate::dtos::{CreateSubscriptionRequest, TransitionResponse};
use crate::middleware::AuthenticatedUser;
use crate::models::CreateSubscription;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

pub async fn create_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Json(req): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let details = state
        .subscriptions
        .create_subscription(CreateSubscription {
            user_id,
            product_id: req.product_id,
            voucher_code: req.voucher_code,
            with_trial: req.with_trial,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

pub async fn list_subscriptions(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let subscriptions = state.subscriptions.list_user_subscriptions(user_id).await?;
    Ok(Json(subscriptions))
}

pub async fn get_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let details = state
        .subscriptions
        .get_subscription(user_id, subscription_id)
        .await?;
    Ok(Json(details))
}

pub async fn get_subscription_history(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let history = state
        .subscriptions
        .get_subscription_history(user_id, subscription_id)
        .await?;
    Ok(Json(history))
}

pub async fn pause_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state
        .subscriptions
        .pause_subscription(user_id, subscription_id)
        .await?;
    Ok(Json(TransitionResponse {
        message: "Subscription paused successfully".to_string(),
        subscription,
    }))
}

pub async fn unpause_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state
        .subscriptions
        .unpause_subscription(user_id, subscription_id)
        .await?;
    Ok(Json(TransitionResponse {
        message: "Subscription unpaused successfully".to_string(),
        subscription,
    }))
}

pub async fn cancel_subscription(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(subscription_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state
        .subscriptions
        .cancel_subscription(user_id, subscription_id)
        .await?;
    Ok(Json(TransitionResponse {
        message: "Subscription cancelled successfully".to_string(),
        subscription,
    }))
}
