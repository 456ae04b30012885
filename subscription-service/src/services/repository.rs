//! Storage contracts the domain services depend on.
//!
//! Two backends implement them: [`Database`](super::Database) over Postgres
//! and [`InMemoryStore`](super::InMemoryStore). Both give the same atomicity
//! and versioning guarantees.

use crate::models::{Product, Subscription, SubscriptionStateChange, Voucher};
use async_trait::async_trait;
use service_core::error::AppError;
use std::sync::Arc;
use uuid::Uuid;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    /// The write landed.
    Applied(T),
    /// The target row does not exist.
    Missing,
    /// The write was refused: a unique key is taken, the row is still
    /// referenced, or (for subscriptions) the expected version is stale.
    Conflict,
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn create_product(&self, product: &Product) -> Result<Product, AppError>;
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError>;
    async fn list_products(&self) -> Result<Vec<Product>, AppError>;
    async fn update_product(&self, product: &Product) -> Result<WriteOutcome<Product>, AppError>;
    /// Deletes the product and vouchers scoped to it. `Conflict` when
    /// subscriptions still reference the product.
    async fn delete_product(&self, product_id: Uuid) -> Result<WriteOutcome<()>, AppError>;
}

#[async_trait]
pub trait VoucherRepository: Send + Sync {
    /// `Conflict` when the code is already taken.
    async fn create_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError>;
    async fn get_voucher(&self, voucher_id: Uuid) -> Result<Option<Voucher>, AppError>;
    /// `code` must already be normalized.
    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, AppError>;
    async fn list_active_vouchers(&self) -> Result<Vec<Voucher>, AppError>;
    async fn list_vouchers_for_product(&self, product_id: Uuid) -> Result<Vec<Voucher>, AppError>;
    async fn update_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError>;
    /// `Conflict` when subscriptions still reference the voucher.
    async fn delete_voucher(&self, voucher_id: Uuid) -> Result<WriteOutcome<()>, AppError>;
}

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Insert the subscription and its creation audit record as one unit.
    async fn create_subscription(
        &self,
        subscription: &Subscription,
        initial_change: &SubscriptionStateChange,
    ) -> Result<Subscription, AppError>;

    async fn get_subscription(&self, subscription_id: Uuid)
        -> Result<Option<Subscription>, AppError>;

    /// Most recently created first.
    async fn list_subscriptions_by_user(&self, user_id: Uuid)
        -> Result<Vec<Subscription>, AppError>;

    /// Persist `subscription` if the stored version still equals
    /// `expected_version`, bump the version, and append `change`, all as one
    /// unit. `Conflict` means the version moved; nothing was written.
    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected_version: i64,
        change: &SubscriptionStateChange,
    ) -> Result<WriteOutcome<Subscription>, AppError>;

    /// Most recent first.
    async fn list_state_changes(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionStateChange>, AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}

/// Storage handles shared by the services.
#[derive(Clone)]
pub struct Repositories {
    pub products: Arc<dyn ProductRepository>,
    pub vouchers: Arc<dyn VoucherRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
}

impl Repositories {
    /// Use one backend for every repository.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ProductRepository + VoucherRepository + SubscriptionRepository + 'static,
    {
        Self {
            products: backend.clone(),
            vouchers: backend.clone(),
            subscriptions: backend,
        }
    }
}
