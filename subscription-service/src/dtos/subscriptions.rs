use crate::models::Subscription;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The owning user comes from the bearer token, not the body.
#[derive(Debug, Deserialize)]
pub struct CreateSubscriptionRequest {
    pub product_id: Uuid,
    #[serde(default)]
    pub voucher_code: Option<String>,
    #[serde(default)]
    pub with_trial: bool,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub message: String,
    pub subscription: Subscription,
}
