//! Domain models for subscription-service.

mod product;
mod subscription;
mod voucher;

pub use product::{CreateProduct, Product, UpdateProduct};
pub use subscription::{
    CreateSubscription, Subscription, SubscriptionDetails, SubscriptionStateChange,
    SubscriptionStatus,
};
pub use voucher::{CreateVoucher, Discount, DiscountType, UpdateVoucher, Voucher};

use rust_decimal::Decimal;
use thiserror::Error;

/// Money amounts are stored as `NUMERIC(12,2)`: below 10^10, two decimals.
pub const MONEY_MAX_DIGITS: u32 = 10;
pub const MONEY_MAX_SCALE: u32 = 2;

/// Tax rates are stored as `NUMERIC(6,4)`: below 100, four decimals.
pub const TAX_RATE_MAX_DIGITS: u32 = 2;
pub const TAX_RATE_MAX_SCALE: u32 = 4;

/// A stored enum column held a value this build does not know.
#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Push a field error onto `errors` with a human-readable message.
pub(crate) fn add_field_error(
    errors: &mut validator::ValidationErrors,
    field: &'static str,
    code: &'static str,
    message: &'static str,
) {
    let mut error = validator::ValidationError::new(code);
    error.message = Some(message.into());
    errors.add(field, error);
}

/// Reject `value` unless it fits a column with `int_digits` integer digits and
/// `max_scale` decimals. Trailing zeros do not count towards the scale.
pub(crate) fn check_decimal_fits(
    errors: &mut validator::ValidationErrors,
    field: &'static str,
    value: Decimal,
    int_digits: u32,
    max_scale: u32,
) {
    let limit = Decimal::from(10u64.pow(int_digits));
    if value.abs() >= limit {
        add_field_error(errors, field, "range", "is too large");
    }
    if value.normalize().scale() > max_scale {
        add_field_error(errors, field, "scale", "has too many decimal places");
    }
}
