//! Product model.

use super::{
    add_field_error, check_decimal_fits, MONEY_MAX_DIGITS, MONEY_MAX_SCALE, TAX_RATE_MAX_DIGITS,
    TAX_RATE_MAX_SCALE,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// A subscribable product. Prices and tax rates are exact decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub product_id: Uuid,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub duration_months: i32,
    /// Fraction, e.g. `0.20` for 20%.
    pub tax_rate: Decimal,
    pub is_active: bool,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct CreateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub duration_months: i32,
    pub tax_rate: Decimal,
    pub is_active: bool,
}

/// Input for replacing a product's attributes.
#[derive(Debug, Clone)]
pub struct UpdateProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub duration_months: i32,
    pub tax_rate: Decimal,
    pub is_active: bool,
}

fn validate_product_fields(
    name: &str,
    price: Decimal,
    duration_months: i32,
    tax_rate: Decimal,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    if name.trim().is_empty() {
        add_field_error(&mut errors, "name", "required", "must not be empty");
    }
    if price < Decimal::ZERO {
        add_field_error(&mut errors, "price", "negative", "must not be negative");
    }
    check_decimal_fits(&mut errors, "price", price, MONEY_MAX_DIGITS, MONEY_MAX_SCALE);
    if duration_months <= 0 {
        add_field_error(
            &mut errors,
            "duration_months",
            "range",
            "must be greater than 0",
        );
    }
    if tax_rate < Decimal::ZERO {
        add_field_error(&mut errors, "tax_rate", "negative", "must not be negative");
    }
    check_decimal_fits(
        &mut errors,
        "tax_rate",
        tax_rate,
        TAX_RATE_MAX_DIGITS,
        TAX_RATE_MAX_SCALE,
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

impl Validate for CreateProduct {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_product_fields(&self.name, self.price, self.duration_months, self.tax_rate)
    }
}

impl Validate for UpdateProduct {
    fn validate(&self) -> Result<(), ValidationErrors> {
        validate_product_fields(&self.name, self.price, self.duration_months, self.tax_rate)
    }
}
