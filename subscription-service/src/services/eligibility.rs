//! Voucher eligibility rules.

use crate::models::Voucher;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Why a voucher cannot be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VoucherIneligibility {
    #[error("voucher is not active")]
    Inactive,

    #[error("voucher is expired")]
    Expired,

    #[error("voucher is not applicable to this product")]
    NotApplicableToProduct,
}

impl VoucherIneligibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherIneligibility::Inactive => "inactive",
            VoucherIneligibility::Expired => "expired",
            VoucherIneligibility::NotApplicableToProduct => "not_applicable",
        }
    }
}

/// Check that `voucher` can be applied to `product_id` at `now`.
///
/// The first failing rule wins, in this order: inactive, expired, product
/// scope. A voucher stays valid up to and including its expiry instant.
pub fn check_voucher_eligibility(
    voucher: &Voucher,
    product_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), VoucherIneligibility> {
    if !voucher.is_active {
        return Err(VoucherIneligibility::Inactive);
    }

    if now > voucher.expires_utc {
        return Err(VoucherIneligibility::Expired);
    }

    if let Some(scoped_product) = voucher.product_id {
        if scoped_product != product_id {
            return Err(VoucherIneligibility::NotApplicableToProduct);
        }
    }

    Ok(())
}
