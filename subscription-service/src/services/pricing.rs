//! Pricing engine: base price, tax and voucher discount to a one-term total.
//!
//! All arithmetic is exact, checked `Decimal`. Nothing is rounded while
//! computing; [`Pricing::rounded`] is applied once, right before the amounts
//! are stored.

use crate::models::{Discount, DiscountType};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use thiserror::Error;

/// An intermediate amount left the range `Decimal` can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("price is too large to compute")]
pub struct PricingOverflow;

/// Scale persisted money amounts are rounded to.
pub const MONEY_SCALE: u32 = 2;

/// Amounts for one subscription term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pricing {
    pub original_price: Decimal,
    pub discounted_price: Option<Decimal>,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

impl Pricing {
    /// Price tax is charged on.
    pub fn billable_price(&self) -> Decimal {
        self.discounted_price.unwrap_or(self.original_price)
    }

    /// Round each price component and the tax half-away-from-zero to
    /// [`MONEY_SCALE`], then rebuild the total from the rounded parts so that
    /// `total == billable + tax` still holds on stored values.
    pub fn rounded(&self) -> Result<Pricing, PricingOverflow> {
        let original_price = round_money(self.original_price);
        let discounted_price = self.discounted_price.map(round_money);
        let tax_amount = round_money(self.tax_amount);
        let billable = discounted_price.unwrap_or(original_price);

        Ok(Pricing {
            original_price,
            discounted_price,
            tax_amount,
            total_amount: billable.checked_add(tax_amount).ok_or(PricingOverflow)?,
        })
    }
}

fn round_money(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Apply a discount to `base_price`, clamping at zero.
pub fn apply_discount(base_price: Decimal, discount: Discount) -> Result<Decimal, PricingOverflow> {
    let reduction = match discount.kind {
        DiscountType::Fixed => discount.value,
        DiscountType::Percentage => base_price
            .checked_mul(discount.value)
            .and_then(|amount| amount.checked_div(Decimal::ONE_HUNDRED))
            .ok_or(PricingOverflow)?,
    };
    let discounted = base_price
        .checked_sub(reduction)
        .ok_or(PricingOverflow)?;
    Ok(discounted.max(Decimal::ZERO))
}

/// Compute the term amounts for a product price and tax rate, with an optional
/// discount. When a discount applies, tax is levied on the discounted price.
pub fn compute_pricing(
    base_price: Decimal,
    tax_rate: Decimal,
    discount: Option<Discount>,
) -> Result<Pricing, PricingOverflow> {
    let discounted_price = discount
        .map(|d| apply_discount(base_price, d))
        .transpose()?;
    let billable = discounted_price.unwrap_or(base_price);
    let tax_amount = billable.checked_mul(tax_rate).ok_or(PricingOverflow)?;
    let total_amount = billable.checked_add(tax_amount).ok_or(PricingOverflow)?;

    Ok(Pricing {
        original_price: base_price,
        discounted_price,
        tax_amount,
        total_amount,
    })
}
