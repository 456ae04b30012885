//! Database service for subscription-service.

use crate::models::{
    Product, Subscription, SubscriptionStateChange, SubscriptionStatus, UnknownVariant, Voucher,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::repository::{
    ProductRepository, SubscriptionRepository, VoucherRepository, WriteOutcome,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}

fn corrupt_row(err: UnknownVariant) -> AppError {
    AppError::DatabaseError(anyhow::anyhow!("Corrupt row: {}", err))
}

#[derive(FromRow)]
struct SubscriptionRow {
    subscription_id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    voucher_id: Option<Uuid>,
    status: String,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    trial_end_date: Option<DateTime<Utc>>,
    original_price: Decimal,
    discounted_price: Option<Decimal>,
    tax_amount: Decimal,
    total_amount: Decimal,
    version: i64,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = AppError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        Ok(Subscription {
            subscription_id: row.subscription_id,
            user_id: row.user_id,
            product_id: row.product_id,
            voucher_id: row.voucher_id,
            status: row.status.parse().map_err(corrupt_row)?,
            start_date: row.start_date,
            end_date: row.end_date,
            trial_end_date: row.trial_end_date,
            original_price: row.original_price,
            discounted_price: row.discounted_price,
            tax_amount: row.tax_amount,
            total_amount: row.total_amount,
            version: row.version,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(FromRow)]
struct StateChangeRow {
    change_id: Uuid,
    subscription_id: Uuid,
    previous_status: Option<String>,
    new_status: String,
    changed_utc: DateTime<Utc>,
    reason: String,
}

impl TryFrom<StateChangeRow> for SubscriptionStateChange {
    type Error = AppError;

    fn try_from(row: StateChangeRow) -> Result<Self, Self::Error> {
        let previous_status = row
            .previous_status
            .map(|s| s.parse::<SubscriptionStatus>())
            .transpose()
            .map_err(corrupt_row)?;

        Ok(SubscriptionStateChange {
            change_id: row.change_id,
            subscription_id: row.subscription_id,
            previous_status,
            new_status: row.new_status.parse().map_err(corrupt_row)?,
            changed_utc: row.changed_utc,
            reason: row.reason,
        })
    }
}

// =========================================================================
// Product Operations
// =========================================================================

#[async_trait]
impl ProductRepository for Database {
    #[instrument(skip(self, product), fields(product_id = %product.product_id))]
    async fn create_product(&self, product: &Product) -> Result<Product, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_product"])
            .start_timer();

        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (product_id, name, description, price, duration_months, tax_rate, is_active, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING product_id, name, description, price, duration_months, tax_rate, is_active, created_utc, updated_utc
            "#,
        )
        .bind(product.product_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.duration_months)
        .bind(product.tax_rate)
        .bind(product.is_active)
        .bind(product.created_utc)
        .bind(product.updated_utc)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create product: {}", e)))?;

        timer.observe_duration();
        info!(product_id = %created.product_id, name = %created.name, "Product created");

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_product"])
            .start_timer();

        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, description, price, duration_months, tax_rate, is_active, created_utc, updated_utc
            FROM products
            WHERE product_id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get product: {}", e)))?;

        timer.observe_duration();

        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_products"])
            .start_timer();

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT product_id, name, description, price, duration_months, tax_rate, is_active, created_utc, updated_utc
            FROM products
            ORDER BY created_utc DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list products: {}", e)))?;

        timer.observe_duration();

        Ok(products)
    }

    #[instrument(skip(self, product), fields(product_id = %product.product_id))]
    async fn update_product(&self, product: &Product) -> Result<WriteOutcome<Product>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_product"])
            .start_timer();

        let updated = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET name = $2, description = $3, price = $4, duration_months = $5, tax_rate = $6, is_active = $7, updated_utc = $8
            WHERE product_id = $1
            RETURNING product_id, name, description, price, duration_months, tax_rate, is_active, created_utc, updated_utc
            "#,
        )
        .bind(product.product_id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.duration_months)
        .bind(product.tax_rate)
        .bind(product.is_active)
        .bind(product.updated_utc)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update product: {}", e)))?;

        timer.observe_duration();

        Ok(updated.map_or(WriteOutcome::Missing, WriteOutcome::Applied))
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, product_id: Uuid) -> Result<WriteOutcome<()>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_product"])
            .start_timer();

        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await;

        timer.observe_duration();

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(WriteOutcome::Missing),
            Ok(_) => {
                info!(product_id = %product_id, "Product deleted");
                Ok(WriteOutcome::Applied(()))
            }
            Err(ref e) if is_foreign_key_violation(e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to delete product: {}",
                e
            ))),
        }
    }
}

// =========================================================================
// Voucher Operations
// =========================================================================

#[async_trait]
impl VoucherRepository for Database {
    #[instrument(skip(self, voucher), fields(code = %voucher.code))]
    async fn create_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_voucher"])
            .start_timer();

        let result = sqlx::query_as::<_, Voucher>(
            r#"
            INSERT INTO vouchers (voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            "#,
        )
        .bind(voucher.voucher_id)
        .bind(&voucher.code)
        .bind(voucher.discount_type.as_str())
        .bind(voucher.discount_value)
        .bind(voucher.product_id)
        .bind(voucher.is_active)
        .bind(voucher.expires_utc)
        .bind(voucher.created_utc)
        .bind(voucher.updated_utc)
        .fetch_one(&self.pool)
        .await;

        timer.observe_duration();

        match result {
            Ok(created) => {
                info!(voucher_id = %created.voucher_id, code = %created.code, "Voucher created");
                Ok(WriteOutcome::Applied(created))
            }
            Err(ref e) if is_unique_violation(e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to create voucher: {}",
                e
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn get_voucher(&self, voucher_id: Uuid) -> Result<Option<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_voucher"])
            .start_timer();

        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            FROM vouchers
            WHERE voucher_id = $1
            "#,
        )
        .bind(voucher_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get voucher: {}", e)))?;

        timer.observe_duration();

        Ok(voucher)
    }

    #[instrument(skip(self))]
    async fn get_voucher_by_code(&self, code: &str) -> Result<Option<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_voucher_by_code"])
            .start_timer();

        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            FROM vouchers
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get voucher by code: {}", e)))?;

        timer.observe_duration();

        Ok(voucher)
    }

    #[instrument(skip(self))]
    async fn list_active_vouchers(&self) -> Result<Vec<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_active_vouchers"])
            .start_timer();

        let vouchers = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            FROM vouchers
            WHERE is_active = TRUE
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list vouchers: {}", e)))?;

        timer.observe_duration();

        Ok(vouchers)
    }

    #[instrument(skip(self))]
    async fn list_vouchers_for_product(&self, product_id: Uuid) -> Result<Vec<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_vouchers_for_product"])
            .start_timer();

        let vouchers = sqlx::query_as::<_, Voucher>(
            r#"
            SELECT voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            FROM vouchers
            WHERE product_id = $1
            ORDER BY code
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list vouchers: {}", e)))?;

        timer.observe_duration();

        Ok(vouchers)
    }

    #[instrument(skip(self, voucher), fields(voucher_id = %voucher.voucher_id))]
    async fn update_voucher(&self, voucher: &Voucher) -> Result<WriteOutcome<Voucher>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_voucher"])
            .start_timer();

        let result = sqlx::query_as::<_, Voucher>(
            r#"
            UPDATE vouchers
            SET code = $2, discount_type = $3, discount_value = $4, product_id = $5, is_active = $6, expires_utc = $7, updated_utc = $8
            WHERE voucher_id = $1
            RETURNING voucher_id, code, discount_type, discount_value, product_id, is_active, expires_utc, created_utc, updated_utc
            "#,
        )
        .bind(voucher.voucher_id)
        .bind(&voucher.code)
        .bind(voucher.discount_type.as_str())
        .bind(voucher.discount_value)
        .bind(voucher.product_id)
        .bind(voucher.is_active)
        .bind(voucher.expires_utc)
        .bind(voucher.updated_utc)
        .fetch_optional(&self.pool)
        .await;

        timer.observe_duration();

        match result {
            Ok(Some(updated)) => Ok(WriteOutcome::Applied(updated)),
            Ok(None) => Ok(WriteOutcome::Missing),
            Err(ref e) if is_unique_violation(e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to update voucher: {}",
                e
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn delete_voucher(&self, voucher_id: Uuid) -> Result<WriteOutcome<()>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_voucher"])
            .start_timer();

        let result = sqlx::query("DELETE FROM vouchers WHERE voucher_id = $1")
            .bind(voucher_id)
            .execute(&self.pool)
            .await;

        timer.observe_duration();

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(WriteOutcome::Missing),
            Ok(_) => Ok(WriteOutcome::Applied(())),
            Err(ref e) if is_foreign_key_violation(e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(AppError::DatabaseError(anyhow::anyhow!(
                "Failed to delete voucher: {}",
                e
            ))),
        }
    }
}

// =========================================================================
// Subscription Operations
// =========================================================================

#[async_trait]
impl SubscriptionRepository for Database {
    #[instrument(skip(self, subscription, initial_change), fields(subscription_id = %subscription.subscription_id))]
    async fn create_subscription(
        &self,
        subscription: &Subscription,
        initial_change: &SubscriptionStateChange,
    ) -> Result<Subscription, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_subscription"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            INSERT INTO subscriptions (subscription_id, user_id, product_id, voucher_id, status, start_date, end_date, trial_end_date, original_price, discounted_price, tax_amount, total_amount, version, created_utc, updated_utc)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING subscription_id, user_id, product_id, voucher_id, status, start_date, end_date, trial_end_date, original_price, discounted_price, tax_amount, total_amount, version, created_utc, updated_utc
            "#,
        )
        .bind(subscription.subscription_id)
        .bind(subscription.user_id)
        .bind(subscription.product_id)
        .bind(subscription.voucher_id)
        .bind(subscription.status.as_str())
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.trial_end_date)
        .bind(subscription.original_price)
        .bind(subscription.discounted_price)
        .bind(subscription.tax_amount)
        .bind(subscription.total_amount)
        .bind(subscription.version)
        .bind(subscription.created_utc)
        .bind(subscription.updated_utc)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create subscription: {}", e)))?;

        insert_state_change(&mut tx, initial_change).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(subscription_id = %row.subscription_id, "Subscription created");

        Subscription::try_from(row)
    }

    #[instrument(skip(self))]
    async fn get_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_subscription"])
            .start_timer();

        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT subscription_id, user_id, product_id, voucher_id, status, start_date, end_date, trial_end_date, original_price, discounted_price, tax_amount, total_amount, version, created_utc, updated_utc
            FROM subscriptions
            WHERE subscription_id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get subscription: {}", e)))?;

        timer.observe_duration();

        row.map(Subscription::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_subscriptions_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_subscriptions_by_user"])
            .start_timer();

        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT subscription_id, user_id, product_id, voucher_id, status, start_date, end_date, trial_end_date, original_price, discounted_price, tax_amount, total_amount, version, created_utc, updated_utc
            FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_utc DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list subscriptions: {}", e)))?;

        timer.observe_duration();

        rows.into_iter().map(Subscription::try_from).collect()
    }

    /// Transitions only move `status` and `updated_utc`; those are the
    /// columns written.
    #[instrument(skip(self, subscription, change), fields(subscription_id = %subscription.subscription_id))]
    async fn update_subscription(
        &self,
        subscription: &Subscription,
        expected_version: i64,
        change: &SubscriptionStateChange,
    ) -> Result<WriteOutcome<Subscription>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_subscription"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            UPDATE subscriptions
            SET status = $2, updated_utc = $3, version = version + 1
            WHERE subscription_id = $1 AND version = $4
            RETURNING subscription_id, user_id, product_id, voucher_id, status, start_date, end_date, trial_end_date, original_price, discounted_price, tax_amount, total_amount, version, created_utc, updated_utc
            "#,
        )
        .bind(subscription.subscription_id)
        .bind(subscription.status.as_str())
        .bind(subscription.updated_utc)
        .bind(expected_version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update subscription: {}", e)))?;

        let Some(row) = row else {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT version FROM subscriptions WHERE subscription_id = $1",
            )
            .bind(subscription.subscription_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to read version: {}", e)))?
            .is_some();

            tx.rollback().await.ok();
            timer.observe_duration();

            if exists {
                warn!(expected_version, "Stale subscription version");
                return Ok(WriteOutcome::Conflict);
            }
            return Ok(WriteOutcome::Missing);
        };

        insert_state_change(&mut tx, change).await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();
        info!(
            subscription_id = %row.subscription_id,
            status = %row.status,
            version = row.version,
            "Subscription status updated"
        );

        Subscription::try_from(row).map(WriteOutcome::Applied)
    }

    #[instrument(skip(self))]
    async fn list_state_changes(
        &self,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionStateChange>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_state_changes"])
            .start_timer();

        let rows = sqlx::query_as::<_, StateChangeRow>(
            r#"
            SELECT change_id, subscription_id, previous_status, new_status, changed_utc, reason
            FROM subscription_state_changes
            WHERE subscription_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list state changes: {}", e)))?;

        timer.observe_duration();

        rows.into_iter()
            .map(SubscriptionStateChange::try_from)
            .collect()
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }
}

async fn insert_state_change(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    change: &SubscriptionStateChange,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO subscription_state_changes (change_id, subscription_id, previous_status, new_status, changed_utc, reason)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(change.change_id)
    .bind(change.subscription_id)
    .bind(change.previous_status.map(|s| s.as_str()))
    .bind(change.new_status.as_str())
    .bind(change.changed_utc)
    .bind(&change.reason)
    .execute(&mut **tx)
    .await
    .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to append state change: {}", e)))?;

    Ok(())
}
