//! Domain error taxonomy for subscription-service.
//!
//! Every failure a service operation can report is a variant here, so the
//! HTTP layer maps outcomes by type. Storage failures carry the underlying
//! [`AppError`] through unchanged.

use crate::services::eligibility::VoucherIneligibility;
use crate::services::lifecycle::TransitionError;
use crate::services::pricing::PricingOverflow;
use service_core::error::AppError;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Product not found")]
    ProductNotFound,

    #[error("Voucher not found")]
    VoucherNotFound,

    #[error("Subscription not found")]
    SubscriptionNotFound,

    #[error("Product is not active")]
    InactiveProduct,

    #[error("Invalid voucher: {0}")]
    Voucher(#[from] VoucherIneligibility),

    #[error("Cannot price subscription: {0}")]
    Pricing(#[from] PricingOverflow),

    #[error("Invalid transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Subscription was modified concurrently")]
    ConcurrentModification,

    #[error("Voucher code already exists")]
    DuplicateVoucherCode,

    #[error("Product is referenced by existing subscriptions")]
    ProductInUse,

    #[error("Voucher is referenced by existing subscriptions")]
    VoucherInUse,

    #[error("Subscription does not belong to the requesting user")]
    Forbidden,

    #[error(transparent)]
    Storage(#[from] AppError),
}

impl DomainError {
    /// Stable label used for error metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation",
            DomainError::ProductNotFound
            | DomainError::VoucherNotFound
            | DomainError::SubscriptionNotFound => "not_found",
            DomainError::InactiveProduct | DomainError::Voucher(_) | DomainError::Pricing(_) => {
                "business_rule"
            }
            DomainError::Transition(_)
            | DomainError::ConcurrentModification
            | DomainError::DuplicateVoucherCode
            | DomainError::ProductInUse
            | DomainError::VoucherInUse => "state_conflict",
            DomainError::Forbidden => "forbidden",
            DomainError::Storage(_) => "storage",
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(errors) => AppError::ValidationError(errors),
            DomainError::ProductNotFound
            | DomainError::VoucherNotFound
            | DomainError::SubscriptionNotFound => AppError::NotFound(anyhow::anyhow!("{}", err)),
            DomainError::InactiveProduct | DomainError::Voucher(_) | DomainError::Pricing(_) => {
                AppError::BadRequest(anyhow::anyhow!("{}", err))
            }
            DomainError::Transition(_)
            | DomainError::ConcurrentModification
            | DomainError::DuplicateVoucherCode
            | DomainError::ProductInUse
            | DomainError::VoucherInUse => AppError::Conflict(anyhow::anyhow!("{}", err)),
            DomainError::Forbidden => AppError::Forbidden(anyhow::anyhow!("{}", err)),
            DomainError::Storage(inner) => inner,
        }
    }
}
