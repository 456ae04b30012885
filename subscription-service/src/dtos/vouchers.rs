use crate::models::{CreateVoucher, DiscountType, UpdateVoucher, Voucher};
use crate::services::Pricing;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct VoucherRequest {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub product_id: Option<Uuid>,
    #[serde(alias = "expires_at")]
    pub expires_utc: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl From<VoucherRequest> for CreateVoucher {
    fn from(req: VoucherRequest) -> Self {
        Self {
            code: req.code,
            discount_type: req.discount_type,
            discount_value: req.discount_value,
            product_id: req.product_id,
            is_active: req.is_active,
            expires_utc: req.expires_utc,
        }
    }
}

impl From<VoucherRequest> for UpdateVoucher {
    fn from(req: VoucherRequest) -> Self {
        Self {
            code: req.code,
            discount_type: req.discount_type,
            discount_value: req.discount_value,
            product_id: req.product_id,
            is_active: req.is_active,
            expires_utc: req.expires_utc,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateVoucherRequest {
    pub code: String,
    pub product_id: Uuid,
}

/// Outcome of a pre-checkout voucher check. Ineligible vouchers are reported
/// here rather than as an HTTP error.
#[derive(Debug, Serialize)]
pub struct ValidateVoucherResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher: Option<Voucher>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pricing: Option<Pricing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ValidateVoucherResponse {
    pub fn valid(voucher: Voucher, pricing: Pricing) -> Self {
        Self {
            valid: true,
            voucher: Some(voucher),
            pricing: Some(pricing),
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            voucher: None,
            pricing: None,
            error: Some(error.into()),
        }
    }
}
