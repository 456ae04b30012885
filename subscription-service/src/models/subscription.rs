//! Subscription and audit-trail models.

use super::{add_field_error, Product, UnknownVariant, Voucher};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Subscription status. `Cancelled` is terminal. A trial is not a status of
/// its own: a trialing subscription is `Active` with a future `trial_end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Paused,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubscriptionStatus::Cancelled)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SubscriptionStatus::Active),
            "paused" => Ok(SubscriptionStatus::Paused),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(UnknownVariant {
                kind: "subscription_status",
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SubscriptionStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Subscription.
///
/// Invariants: `end_date > start_date`; when `trial_end_date` is set the
/// billable term starts at it; `total_amount` equals the billable price
/// (`discounted_price` if present, else `original_price`) plus `tax_amount`.
/// `version` increases by one with every persisted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub original_price: Decimal,
    pub discounted_price: Option<Decimal>,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub version: i64,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Subscription {
    /// True while the trial window is still open at `now`.
    pub fn is_in_trial(&self, now: DateTime<Utc>) -> bool {
        self.trial_end_date.is_some_and(|trial_end| now < trial_end)
    }

    /// Price the tax was computed from.
    pub fn billable_price(&self) -> Decimal {
        self.discounted_price.unwrap_or(self.original_price)
    }
}

/// Immutable audit record of one status transition. The record written at
/// creation has no previous status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionStateChange {
    pub change_id: Uuid,
    pub subscription_id: Uuid,
    pub previous_status: Option<SubscriptionStatus>,
    pub new_status: SubscriptionStatus,
    pub changed_utc: DateTime<Utc>,
    pub reason: String,
}

/// A subscription together with the product and voucher it was priced from.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub product: Option<Product>,
    pub voucher: Option<Voucher>,
}

/// Input for creating a subscription.
#[derive(Debug, Clone)]
pub struct CreateSubscription {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub voucher_code: Option<String>,
    pub with_trial: bool,
}

impl Validate for CreateSubscription {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.user_id.is_nil() {
            add_field_error(&mut errors, "user_id", "required", "must not be empty");
        }
        if self.product_id.is_nil() {
            add_field_error(&mut errors, "product_id", "required", "must not be empty");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
