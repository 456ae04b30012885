//! In-process storage backend.
//!
//! Holds every table behind one `RwLock`, so each repository call is atomic
//! with respect to the others. Used by the test suite and by
//! `STORAGE_BACKEND=memory`.

use crate::models::{Product, Subscription, SubscriptionStateChange, Voucher};
use crate::services::repository::{
    ProductRepository, SubscriptionRepository, VoucherRepository, WriteOutcome,
};
use async_trait::async_trait;
use service_core::error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    products: HashMap<Uuid, Product>,
    vouchers: HashMap<Uuid, Voucher>,
    subscriptions: HashMap<Uuid, Subscription>,
    /// Append order per subscription.
    state_changes: HashMap<Uuid, Vec<SubscriptionStateChange>>,
}

impl Tables {
    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.vouchers
            .values()
            .any(|v| v.code == code && Some(v.voucher_id) != except)
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryStore {
    async fn create_product(&self, product: &Product) -> Result<Product, AppError> {
        let mut tables = self.tables.write().await;
        tables.products.insert(product.product_id, product.clone());
        Ok(product.clone())
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let tables = self.tables.read().await;
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(products)
    }

    async fn update_product(&self, product: &Product) -> Result<WriteOutcome<Product>, AppError> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(&product.product_id) {
            Some(stored) => {
                *stored = product.clone();
                Ok(WriteOutcome::Applied(product.clone()))
            }
            None => Ok(WriteOutcome::Missing),
        }
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, product_id: Uuid) -> Result<WriteOutcome<()>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.products.contains_key(&product_id) {
            return Ok(WriteOutcome::Missing);
        }
        if tables
            .subscriptions
            .values()
            .any(|s| s.product_id == product_id)
        {
            return Ok(WriteOutcome::Conflict);
        }

        tables.products.remove(&product_id);
        tables
            .vouchers
            .retain(|_, v| v.product_id != Some(product_id));
        debug!(product_id = %product_id, "Product removed from memory store");
        Ok(WriteOutcome::Applied(()))
    }
}

#[async_trait]
impl VoucherRepository for InMemoryStore {
    async fn create_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError> {
        let mut tables = self.tables.write().await;
        if tables.code_taken(&voucher.code, None) {
            return Ok(WriteOutcome::Conflict);
        }
        tables.vouchers.insert(voucher.voucher_id, voucher.clone());
        Ok(WriteOutcome::Applied(voucher.clone()))
    }

    async fn get_voucher(&self, voucher_id: Uuid) -> Result<Option<Voucher>, AppError> {
        Ok(self.tables.read().await.vouchers.get(&voucher_id).cloned())
    }

    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables.vouchers.values().find(|v| v.code == code).cloned())
    }

    async fn list_active_vouchers(&self) -> Result<Vec<Voucher>, AppError> {
        let tables = self.tables.read().await;
        let mut vouchers: Vec<Voucher> = tables
            .vouchers
            .values()
            .filter(|v| v.is_active)
            .cloned()
            .collect();
        vouchers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(vouchers)
    }

    async fn list_vouchers_for_product(&self, product_id: Uuid) -> Result<Vec<Voucher>, AppError> {
        let tables = self.tables.read().await;
        let mut vouchers: Vec<Voucher> = tables
            .vouchers
            .values()
            .filter(|v| v.product_id == Some(product_id))
            .cloned()
            .collect();
        vouchers.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(vouchers)
    }

    async fn update_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.vouchers.contains_key(&voucher.voucher_id) {
            return Ok(WriteOutcome::Missing);
        }
        if tables.code_taken(&voucher.code, Some(voucher.voucher_id)) {
            return Ok(WriteOutcome::Conflict);
        }
        tables.vouchers.insert(voucher.voucher_id, voucher.clone());
        Ok(WriteOutcome::Applied(voucher.clone()))
    }

    async fn delete_voucher(&self, voucher_id: Uuid) -> Result<WriteOutcome<()>, AppError> {
        let mut tables = self.tables.write().await;
        if !tables.vouchers.contains_key(&voucher_id) {
            return Ok(WriteOutcome::Missing);
        }
        if tables
            .subscriptions
            .values()
            .any(|s| s.voucher_id == Some(voucher_id))
        {
            return Ok(WriteOutcome::Conflict);
        }
        tables.vouchers.remove(&voucher_id);
        Ok(WriteOutcome::Applied(()))
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn create_subscription(
        &self,
        subscription: &Subscription,
        initial_change: &SubscriptionStateChange,
    ) -> Result<Subscription, AppError> {
        let mut tables = self.tables.write().await;
        if tables
            .subscriptions
            .contains_key(&subscription.subscription_id)
        {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Subscription {} already exists",
                subscription.subscription_id
            )));
        }

        tables
            .subscriptions
            .insert(subscription.subscription_id, subscription.clone());
        tables
            .state_changes
            .entry(subscription.subscription_id)
            .or_default()
            .push(initial_change.clone());

        Ok(subscription.clone())
    }

    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .subscriptions
            .get(&subscription_id)
            .cloned())
    }

    async fn list_subscriptions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let tables = self.tables.read().await;
        let mut subscriptions: Vec<Subscription> = tables
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_utc.cmp(&a.created_utc));
        Ok(subscriptions)
    }

    #[instrument(skip(self, subscription, change), fields(subscription_id = %subscription.subscription_id))]
    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected_version: i64,
        change: &SubscriptionStateChange,
    ) -> Result<WriteOutcome<Subscription>, AppError> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.subscriptions.get_mut(&subscription.subscription_id) else {
            return Ok(WriteOutcome::Missing);
        };
        if stored.version != expected_version {
            debug!(
                stored_version = stored.version,
                expected_version, "Stale subscription version"
            );
            return Ok(WriteOutcome::Conflict);
        }

        let mut updated = subscription.clone();
        updated.version = expected_version + 1;
        *stored = updated.clone();

        tables
            .state_changes
            .entry(subscription.subscription_id)
            .or_default()
            .push(change.clone());

        Ok(WriteOutcome::Applied(updated))
    }

    async fn list_state_changes(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionStateChange>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .state_changes
            .get(&subscription_id)
            .map(|changes| changes.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}
