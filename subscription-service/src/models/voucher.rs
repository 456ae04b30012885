//! Voucher model.

use super::{
    add_field_error, check_decimal_fits, UnknownVariant, MONEY_MAX_DIGITS, MONEY_MAX_SCALE,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// How a voucher's discount value is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Fixed,
    Percentage,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Fixed => "fixed",
            DiscountType::Percentage => "percentage",
        }
    }
}

impl FromStr for DiscountType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(DiscountType::Fixed),
            "percentage" => Ok(DiscountType::Percentage),
            other => Err(UnknownVariant {
                kind: "discount_type",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for DiscountType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// The part of a voucher the pricing engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Discount {
    pub kind: DiscountType,
    pub value: Decimal,
}

/// Discount voucher. `code` is stored upper-cased; `product_id = None` means
/// the voucher applies to any product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Voucher {
    pub voucher_id: Uuid,
    pub code: String,
    #[sqlx(try_from = "String")]
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub product_id: Option<Uuid>,
    pub is_active: bool,
    pub expires_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Voucher {
    pub fn discount(&self) -> Discount {
        Discount {
            kind: self.discount_type,
            value: self.discount_value,
        }
    }

    /// Canonical form of a voucher code for storage and lookup.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }
}

/// Input for creating a voucher.
#[derive(Debug, Clone)]
pub struct CreateVoucher {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub product_id: Option<Uuid>,
    pub is_active: bool,
    pub expires_utc: DateTime<Utc>,
}

/// Input for replacing a voucher's attributes.
#[derive(Debug, Clone)]
pub struct UpdateVoucher {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub product_id: Option<Uuid>,
    pub is_active: bool,
    pub expires_utc: DateTime<Utc>,
}

fn validate_discount(
    errors: &mut ValidationErrors,
    code: &str,
    discount_type: DiscountType,
    discount_value: Decimal,
) {
    if code.trim().is_empty() {
        add_field_error(errors, "code", "required", "must not be empty");
    }
    if discount_value < Decimal::ZERO {
        add_field_error(errors, "discount_value", "negative", "must not be negative");
    }
    check_decimal_fits(
        errors,
        "discount_value",
        discount_value,
        MONEY_MAX_DIGITS,
        MONEY_MAX_SCALE,
    );
    if discount_type == DiscountType::Percentage && discount_value > Decimal::ONE_HUNDRED {
        add_field_error(
            errors,
            "discount_value",
            "range",
            "percentage cannot be greater than 100",
        );
    }
}

impl CreateVoucher {
    /// Validate against an explicit clock; expiry must lie after `now`.
    pub fn validate_at(&self, now: DateTime<Utc>) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_discount(
            &mut errors,
            &self.code,
            self.discount_type,
            self.discount_value,
        );
        if self.expires_utc <= now {
            add_field_error(&mut errors, "expires_utc", "past", "must be in the future");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for CreateVoucher {
    fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_at(Utc::now())
    }
}

impl Validate for UpdateVoucher {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        validate_discount(
            &mut errors,
            &self.code,
            self.discount_type,
            self.discount_value,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
