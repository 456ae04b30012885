//! Subscription orchestration: creation, read paths and lifecycle
//! transitions.
//!
//! Ownership is enforced here. Every read and transition takes the
//! requesting user and fails with [`DomainError::Forbidden`] when the
//! subscription belongs to someone else.

use crate::error::DomainError;
use crate::models::{
    add_field_error, CreateSubscription, Subscription, SubscriptionDetails,
    SubscriptionStateChange, SubscriptionStatus, Voucher,
};
use crate::services::eligibility::check_voucher_eligibility;
use crate::services::lifecycle::{
    apply_transition, creation_state_change, Transition, TransitionOutcome,
};
use crate::services::metrics::{
    record_billed_amount, record_concurrency_retry, record_error, record_subscription_operation,
    record_voucher_validation,
};
use crate::services::pricing::compute_pricing;
use crate::services::repository::{Repositories, WriteOutcome};
use chrono::{DateTime, Months, Utc};
use rust_decimal::prelude::ToPrimitive;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

/// Length of the free trial prepended to the billable term.
pub const TRIAL_MONTHS: u32 = 1;

/// Attempts made for a transition whose version check keeps failing.
pub const MAX_TRANSITION_ATTEMPTS: u32 = 3;

fn out_of_range(field: &'static str) -> DomainError {
    let mut errors = ValidationErrors::new();
    add_field_error(&mut errors, field, "range", "date out of range");
    DomainError::Validation(errors)
}

fn add_months(
    date: DateTime<Utc>,
    months: u32,
    field: &'static str,
) -> Result<DateTime<Utc>, DomainError> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| out_of_range(field))
}

#[derive(Clone)]
pub struct SubscriptionService {
    repos: Repositories,
}

impl SubscriptionService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Create a subscription, optionally with a trial and a voucher.
    ///
    /// Without a trial the term starts now. With a trial the trial runs for
    /// [`TRIAL_MONTHS`] and the term starts when it ends. Any voucher failure
    /// fails the whole creation.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, product_id = %input.product_id))]
    pub async fn create_subscription(
        &self,
        input: CreateSubscription,
    ) -> Result<SubscriptionDetails, DomainError> {
        let result = self.create_subscription_inner(input).await;
        match &result {
            Ok(_) => record_subscription_operation("create", "success"),
            Err(e) => {
                record_subscription_operation("create", e.kind());
                record_error(e.kind(), "create_subscription");
            }
        }
        result
    }

    async fn create_subscription_inner(
        &self,
        input: CreateSubscription,
    ) -> Result<SubscriptionDetails, DomainError> {
        input.validate()?;

        let product = self
            .repos
            .products
            .get_product(input.product_id)
            .await?
            .ok_or(DomainError::ProductNotFound)?;
        if !product.is_active {
            return Err(DomainError::InactiveProduct);
        }

        let now = Utc::now();
        let (start_date, trial_end_date) = if input.with_trial {
            let trial_end = add_months(now, TRIAL_MONTHS, "with_trial")?;
            (trial_end, Some(trial_end))
        } else {
            (now, None)
        };
        let duration = u32::try_from(product.duration_months)
            .ok()
            .filter(|months| *months > 0)
            .ok_or_else(|| out_of_range("duration_months"))?;
        let end_date = add_months(start_date, duration, "duration_months")?;

        let voucher_code = input
            .voucher_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        let voucher = match voucher_code {
            Some(code) => Some(self.eligible_voucher(code, product.product_id, now).await?),
            None => None,
        };

        let pricing = compute_pricing(
            product.price,
            product.tax_rate,
            voucher.as_ref().map(Voucher::discount),
        )?
        .rounded()?;

        let subscription = Subscription {
            subscription_id: Uuid::new_v4(),
            user_id: input.user_id,
            product_id: product.product_id,
            voucher_id: voucher.as_ref().map(|v| v.voucher_id),
            status: SubscriptionStatus::Active,
            start_date,
            end_date,
            trial_end_date,
            original_price: pricing.original_price,
            discounted_price: pricing.discounted_price,
            tax_amount: pricing.tax_amount,
            total_amount: pricing.total_amount,
            version: 1,
            created_utc: now,
            updated_utc: now,
        };
        let initial_change = creation_state_change(&subscription);

        let created = self
            .repos
            .subscriptions
            .create_subscription(&subscription, &initial_change)
            .await?;

        record_billed_amount(
            &created.product_id.to_string(),
            created.total_amount.to_f64().unwrap_or_default(),
        );
        info!(
            subscription_id = %created.subscription_id,
            total_amount = %created.total_amount,
            trial = created.trial_end_date.is_some(),
            "Subscription created"
        );

        Ok(SubscriptionDetails {
            subscription: created,
            product: Some(product),
            voucher,
        })
    }

    async fn eligible_voucher(
        &self,
        code: &str,
        product_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Voucher, DomainError> {
        let voucher = self
            .repos
            .vouchers
            .get_voucher_by_code(&Voucher::normalize_code(code))
            .await?
            .ok_or(DomainError::VoucherNotFound)?;

        if let Err(reason) = check_voucher_eligibility(&voucher, product_id, now) {
            record_voucher_validation(reason.as_str());
            warn!(code = %voucher.code, reason = reason.as_str(), "Voucher rejected");
            return Err(reason.into());
        }
        record_voucher_validation("valid");

        Ok(voucher)
    }

    async fn load_owned(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, DomainError> {
        let subscription = self
            .repos
            .subscriptions
            .get_subscription(subscription_id)
            .await?
            .ok_or(DomainError::SubscriptionNotFound)?;

        if subscription.user_id != user_id {
            warn!(subscription_id = %subscription_id, "Subscription accessed by non-owner");
            return Err(DomainError::Forbidden);
        }
        Ok(subscription)
    }

    async fn with_details(
        &self,
        subscription: Subscription,
    ) -> Result<SubscriptionDetails, DomainError> {
        let product = self
            .repos
            .products
            .get_product(subscription.product_id)
            .await?;
        let voucher = match subscription.voucher_id {
            Some(voucher_id) => self.repos.vouchers.get_voucher(voucher_id).await?,
            None => None,
        };

        Ok(SubscriptionDetails {
            subscription,
            product,
            voucher,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<SubscriptionDetails, DomainError> {
        let subscription = self.load_owned(user_id, subscription_id).await?;
        self.with_details(subscription).await
    }

    /// Most recently created first.
    #[instrument(skip(self))]
    pub async fn list_user_subscriptions(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<SubscriptionDetails>, DomainError> {
        let subscriptions = self
            .repos
            .subscriptions
            .list_subscriptions_by_user(user_id)
            .await?;

        let mut details = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            details.push(self.with_details(subscription).await?);
        }
        Ok(details)
    }

    /// Audit trail, most recent first.
    #[instrument(skip(self))]
    pub async fn get_subscription_history(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Vec<SubscriptionStateChange>, DomainError> {
        self.load_owned(user_id, subscription_id).await?;
        Ok(self
            .repos
            .subscriptions
            .list_state_changes(subscription_id)
            .await?)
    }

    pub async fn pause_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, DomainError> {
        self.transition(user_id, subscription_id, Transition::Pause)
            .await
    }

    pub async fn unpause_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, DomainError> {
        self.transition(user_id, subscription_id, Transition::Unpause)
            .await
    }

    /// Cancelling an already-cancelled subscription succeeds and records
    /// nothing.
    pub async fn cancel_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> Result<Subscription, DomainError> {
        self.transition(user_id, subscription_id, Transition::Cancel)
            .await
    }

    #[instrument(skip(self), fields(transition = transition.as_str()))]
    async fn transition(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
        transition: Transition,
    ) -> Result<Subscription, DomainError> {
        let result = self
            .transition_with_retry(user_id, subscription_id, transition)
            .await;
        match &result {
            Ok(_) => record_subscription_operation(transition.as_str(), "success"),
            Err(e) => {
                record_subscription_operation(transition.as_str(), e.kind());
                record_error(e.kind(), transition.as_str());
            }
        }
        result
    }

    /// Read, check the guard, and write against the version that was read.
    /// A stale version means another writer got there first; reload and
    /// check the guard again against the fresh state.
    async fn transition_with_retry(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
        transition: Transition,
    ) -> Result<Subscription, DomainError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let current = self.load_owned(user_id, subscription_id).await?;

            let mut next = current.clone();
            let change = match apply_transition(&mut next, transition, Utc::now())? {
                TransitionOutcome::Changed(change) => change,
                TransitionOutcome::Unchanged => {
                    debug!(subscription_id = %subscription_id, "Transition is a no-op");
                    return Ok(current);
                }
            };

            match self
                .repos
                .subscriptions
                .update_subscription(&next, current.version, &change)
                .await?
            {
                WriteOutcome::Applied(updated) => {
                    info!(
                        subscription_id = %subscription_id,
                        from = current.status.as_str(),
                        to = updated.status.as_str(),
                        "Subscription transitioned"
                    );
                    return Ok(updated);
                }
                WriteOutcome::Missing => return Err(DomainError::SubscriptionNotFound),
                WriteOutcome::Conflict => {
                    record_concurrency_retry(transition.as_str());
                    debug!(attempt, "Stale version, retrying transition");
                }
            }
        }

        Err(DomainError::ConcurrentModification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateProduct, CreateVoucher, DiscountType, Product};
    use crate::services::lifecycle::TransitionError;
    use crate::services::repository::SubscriptionRepository;
    use crate::services::{InMemoryStore, ProductService, VoucherService};
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal::Decimal;
    use service_core::error::AppError;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct Fixture {
        store: Arc<InMemoryStore>,
        products: ProductService,
        vouchers: VoucherService,
        subscriptions: SubscriptionService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let repos = Repositories::from_backend(store.clone());
        Fixture {
            products: ProductService::new(repos.products.clone()),
            vouchers: VoucherService::new(repos.vouchers.clone(), repos.products.clone()),
            subscriptions: SubscriptionService::new(repos),
            store,
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn product(f: &Fixture, price: &str, tax_rate: &str, months: i32) -> Product {
        f.products
            .create_product(CreateProduct {
                name: "Streaming".to_string(),
                description: String::new(),
                price: d(price),
                duration_months: months,
                tax_rate: d(tax_rate),
                is_active: true,
            })
            .await
            .unwrap()
    }

    fn request(user_id: Uuid, product_id: Uuid) -> CreateSubscription {
        CreateSubscription {
            user_id,
            product_id,
            voucher_code: None,
            with_trial: false,
        }
    }

    async fn history_len(f: &Fixture, user: Uuid, id: Uuid) -> usize {
        f.subscriptions
            .get_subscription_history(user, id)
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn creates_active_subscription_with_creation_record() {
        let f = fixture();
        let p = product(&f, "100.00", "0.20", 12).await;
        let user = Uuid::new_v4();

        let created = f
            .subscriptions
            .create_subscription(request(user, p.product_id))
            .await
            .unwrap();
        let s = &created.subscription;

        assert_eq!(s.status, SubscriptionStatus::Active);
        assert_eq!(s.trial_end_date, None);
        assert_eq!(s.end_date, s.start_date + Months::new(12));
        assert_eq!(s.original_price, d("100.00"));
        assert_eq!(s.tax_amount, d("20.00"));
        assert_eq!(s.total_amount, d("120.00"));
        assert_eq!(created.product.as_ref().map(|p| p.product_id), Some(p.product_id));

        let history = f
            .subscriptions
            .get_subscription_history(user, s.subscription_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].previous_status, None);
        assert_eq!(history[0].new_status, SubscriptionStatus::Active);
        assert_eq!(history[0].reason, "Subscription created");
    }

    #[tokio::test]
    async fn trial_is_prepended_to_the_term() {
        let f = fixture();
        let p = product(&f, "10.00", "0", 1).await;
        let before = Utc::now();

        let mut input = request(Uuid::new_v4(), p.product_id);
        input.with_trial = true;
        let s = f
            .subscriptions
            .create_subscription(input)
            .await
            .unwrap()
            .subscription;

        let trial_end = s.trial_end_date.expect("trial end date");
        assert_eq!(trial_end, s.start_date);
        assert_eq!(s.start_date, s.created_utc + Months::new(1));
        assert_eq!(s.end_date, s.start_date + Months::new(1));
        assert!(s.start_date >= before + Months::new(1));
        assert_eq!(s.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn summer_voucher_end_to_end() {
        let f = fixture();
        let p = product(&f, "100.00", "0.20", 1).await;
        let voucher = f
            .vouchers
            .create_voucher(CreateVoucher {
                code: "SUMMER25".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: d("25"),
                product_id: Some(p.product_id),
                is_active: true,
                expires_utc: Utc::now() + Duration::days(30),
            })
            .await
            .unwrap();

        let mut input = request(Uuid::new_v4(), p.product_id);
        input.voucher_code = Some("summer25".to_string());
        let created = f.subscriptions.create_subscription(input).await.unwrap();
        let s = &created.subscription;

        assert_eq!(s.original_price, d("100.00"));
        assert_eq!(s.discounted_price, Some(d("75.00")));
        assert_eq!(s.tax_amount, d("15.00"));
        assert_eq!(s.total_amount, d("90.00"));
        assert_eq!(s.voucher_id, Some(voucher.voucher_id));
        assert_eq!(created.voucher.map(|v| v.code), Some("SUMMER25".to_string()));
    }

    #[tokio::test]
    async fn blank_voucher_code_means_no_voucher() {
        let f = fixture();
        let p = product(&f, "50.00", "0.10", 1).await;
        let mut input = request(Uuid::new_v4(), p.product_id);
        input.voucher_code = Some("   ".to_string());

        let s = f
            .subscriptions
            .create_subscription(input)
            .await
            .unwrap()
            .subscription;
        assert_eq!(s.voucher_id, None);
        assert_eq!(s.discounted_price, None);
        assert_eq!(s.total_amount, d("55.00"));
    }

    #[tokio::test]
    async fn voucher_failures_abort_creation() {
        let f = fixture();
        let a = product(&f, "100.00", "0.20", 1).await;
        let b = product(&f, "100.00", "0.20", 1).await;
        f.vouchers
            .create_voucher(CreateVoucher {
                code: "ONLY-A".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: d("10"),
                product_id: Some(a.product_id),
                is_active: true,
                expires_utc: Utc::now() + Duration::days(1),
            })
            .await
            .unwrap();
        let user = Uuid::new_v4();

        let mut wrong_product = request(user, b.product_id);
        wrong_product.voucher_code = Some("ONLY-A".to_string());
        assert!(matches!(
            f.subscriptions.create_subscription(wrong_product).await,
            Err(DomainError::Voucher(_))
        ));

        let mut unknown = request(user, a.product_id);
        unknown.voucher_code = Some("MISSING".to_string());
        assert!(matches!(
            f.subscriptions.create_subscription(unknown).await,
            Err(DomainError::VoucherNotFound)
        ));

        assert!(f
            .subscriptions
            .list_user_subscriptions(user)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn rejects_invalid_input_and_unusable_products() {
        let f = fixture();

        match f
            .subscriptions
            .create_subscription(request(Uuid::nil(), Uuid::nil()))
            .await
        {
            Err(DomainError::Validation(errors)) => {
                assert_eq!(errors.field_errors().len(), 2);
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        assert!(matches!(
            f.subscriptions
                .create_subscription(request(Uuid::new_v4(), Uuid::new_v4()))
                .await,
            Err(DomainError::ProductNotFound)
        ));

        let p = f
            .products
            .create_product(CreateProduct {
                name: "Retired".to_string(),
                description: String::new(),
                price: d("5"),
                duration_months: 1,
                tax_rate: d("0"),
                is_active: false,
            })
            .await
            .unwrap();
        assert!(matches!(
            f.subscriptions
                .create_subscription(request(Uuid::new_v4(), p.product_id))
                .await,
            Err(DomainError::InactiveProduct)
        ));
    }

    #[tokio::test]
    async fn pause_unpause_cancel_round_trip() {
        let f = fixture();
        let p = product(&f, "20.00", "0", 1).await;
        let user = Uuid::new_v4();
        let id = f
            .subscriptions
            .create_subscription(request(user, p.product_id))
            .await
            .unwrap()
            .subscription
            .subscription_id;

        let paused = f.subscriptions.pause_subscription(user, id).await.unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
        assert_eq!(paused.version, 2);

        assert!(matches!(
            f.subscriptions.pause_subscription(user, id).await,
            Err(DomainError::Transition(TransitionError::NotActive))
        ));

        let active = f.subscriptions.unpause_subscription(user, id).await.unwrap();
        assert_eq!(active.status, SubscriptionStatus::Active);

        let cancelled = f.subscriptions.cancel_subscription(user, id).await.unwrap();
        assert_eq!(cancelled.status, SubscriptionStatus::Cancelled);
        assert_eq!(history_len(&f, user, id).await, 4);

        let again = f.subscriptions.cancel_subscription(user, id).await.unwrap();
        assert_eq!(again.status, SubscriptionStatus::Cancelled);
        assert_eq!(again.version, cancelled.version);
        assert_eq!(history_len(&f, user, id).await, 4);

        assert!(matches!(
            f.subscriptions.unpause_subscription(user, id).await,
            Err(DomainError::Transition(TransitionError::NotPaused))
        ));

        let history = f
            .subscriptions
            .get_subscription_history(user, id)
            .await
            .unwrap();
        assert_eq!(history[0].new_status, SubscriptionStatus::Cancelled);
        assert_eq!(history[0].reason, "User requested cancellation");
        assert_eq!(history[3].reason, "Subscription created");
    }

    #[tokio::test]
    async fn trial_gates_pause_until_it_ends() {
        let f = fixture();
        let p = product(&f, "20.00", "0", 1).await;
        let user = Uuid::new_v4();

        let mut input = request(user, p.product_id);
        input.with_trial = true;
        let trialing = f
            .subscriptions
            .create_subscription(input)
            .await
            .unwrap()
            .subscription;
        assert!(matches!(
            f.subscriptions
                .pause_subscription(user, trialing.subscription_id)
                .await,
            Err(DomainError::Transition(TransitionError::InTrial))
        ));

        // A subscription whose trial already elapsed.
        let now = Utc::now();
        let mut elapsed = trialing.clone();
        elapsed.subscription_id = Uuid::new_v4();
        elapsed.trial_end_date = Some(now - Duration::days(1));
        elapsed.start_date = now - Duration::days(1);
        elapsed.end_date = now + Duration::days(29);
        f.store
            .create_subscription(&elapsed, &creation_state_change(&elapsed))
            .await
            .unwrap();

        let paused = f
            .subscriptions
            .pause_subscription(user, elapsed.subscription_id)
            .await
            .unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
    }

    #[tokio::test]
    async fn other_users_are_forbidden() {
        let f = fixture();
        let p = product(&f, "20.00", "0", 1).await;
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let id = f
            .subscriptions
            .create_subscription(request(owner, p.product_id))
            .await
            .unwrap()
            .subscription
            .subscription_id;

        assert!(matches!(
            f.subscriptions.get_subscription(intruder, id).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            f.subscriptions.cancel_subscription(intruder, id).await,
            Err(DomainError::Forbidden)
        ));
        assert!(matches!(
            f.subscriptions.get_subscription_history(intruder, id).await,
            Err(DomainError::Forbidden)
        ));
        assert_eq!(history_len(&f, owner, id).await, 1);
        assert!(matches!(
            f.subscriptions.pause_subscription(owner, Uuid::new_v4()).await,
            Err(DomainError::SubscriptionNotFound)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_pauses_apply_once() {
        let f = fixture();
        let p = product(&f, "20.00", "0", 1).await;
        let user = Uuid::new_v4();
        let id = f
            .subscriptions
            .create_subscription(request(user, p.product_id))
            .await
            .unwrap()
            .subscription
            .subscription_id;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = f.subscriptions.clone();
            handles.push(tokio::spawn(async move {
                service.pause_subscription(user, id).await
            }));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(DomainError::Transition(TransitionError::NotActive)) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(history_len(&f, user, id).await, 2);
    }

    /// Reports a stale version for the first `stale_writes` updates.
    struct ContendedStore {
        inner: Arc<InMemoryStore>,
        stale_writes: AtomicU32,
    }

    #[async_trait]
    impl SubscriptionRepository for ContendedStore {
        async fn create_subscription(
            &self,
            subscription: &Subscription,
            initial_change: &SubscriptionStateChange,
        ) -> Result<Subscription, AppError> {
            self.inner
                .create_subscription(subscription, initial_change)
                .await
        }

        async fn get_subscription(
            &self,
            subscription_id: Uuid,
        ) -> Result<Option<Subscription>, AppError> {
            self.inner.get_subscription(subscription_id).await
        }

        async fn list_subscriptions_by_user(
            &self,
            user_id: Uuid,
        ) -> Result<Vec<Subscription>, AppError> {
            self.inner.list_subscriptions_by_user(user_id).await
        }

        async fn update_subscription(
            &self,
            subscription: &Subscription,
            expected_version: i64,
            change: &SubscriptionStateChange,
        ) -> Result<WriteOutcome<Subscription>, AppError> {
            let remaining = self.stale_writes.load(Ordering::SeqCst);
            if remaining > 0 {
                self.stale_writes.store(remaining - 1, Ordering::SeqCst);
                return Ok(WriteOutcome::Conflict);
            }
            self.inner
                .update_subscription(subscription, expected_version, change)
                .await
        }

        async fn list_state_changes(
            &self,
            subscription_id: Uuid,
        ) -> Result<Vec<SubscriptionStateChange>, AppError> {
            self.inner.list_state_changes(subscription_id).await
        }

        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    async fn contended(stale_writes: u32) -> (SubscriptionService, Arc<InMemoryStore>, Uuid, Uuid) {
        let f = fixture();
        let p = product(&f, "20.00", "0", 1).await;
        let user = Uuid::new_v4();
        let id = f
            .subscriptions
            .create_subscription(request(user, p.product_id))
            .await
            .unwrap()
            .subscription
            .subscription_id;

        let mut repos = Repositories::from_backend(f.store.clone());
        repos.subscriptions = Arc::new(ContendedStore {
            inner: f.store.clone(),
            stale_writes: AtomicU32::new(stale_writes),
        });
        (SubscriptionService::new(repos), f.store, user, id)
    }

    #[tokio::test]
    async fn stale_writes_are_retried() {
        let (service, store, user, id) = contended(MAX_TRANSITION_ATTEMPTS - 1).await;

        let paused = service.pause_subscription(user, id).await.unwrap();
        assert_eq!(paused.status, SubscriptionStatus::Paused);
        assert_eq!(store.list_state_changes(id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persistent_contention_gives_up_without_writing() {
        let (service, store, user, id) = contended(MAX_TRANSITION_ATTEMPTS).await;

        assert!(matches!(
            service.pause_subscription(user, id).await,
            Err(DomainError::ConcurrentModification)
        ));
        let stored = store.get_subscription(id).await.unwrap().unwrap();
        assert_eq!(stored.status, SubscriptionStatus::Active);
        assert_eq!(store.list_state_changes(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn out_of_range_product_is_rejected_before_pricing() {
        let f = fixture();
        let result = f
            .products
            .create_product(CreateProduct {
                name: "Unbounded".to_string(),
                description: String::new(),
                price: d("100000000000000000000"),
                duration_months: 1,
                tax_rate: d("10000000000"),
                is_active: true,
            })
            .await;

        let errors = match result {
            Err(DomainError::Validation(errors)) => errors,
            other => panic!("expected a validation error, got {:?}", other),
        };
        let fields = errors.field_errors();
        assert!(fields.contains_key("price"));
        assert!(fields.contains_key("tax_rate"));
    }

    #[tokio::test]
    async fn unpriceable_stored_product_fails_without_writing() {
        use crate::services::repository::ProductRepository;
        use crate::services::PricingOverflow;

        let f = fixture();
        let now = Utc::now();
        // Written straight to storage, so no validation ran.
        let product = f
            .store
            .create_product(&Product {
                product_id: Uuid::new_v4(),
                name: "Legacy".to_string(),
                description: String::new(),
                price: Decimal::MAX,
                duration_months: 1,
                tax_rate: d("2"),
                is_active: true,
                created_utc: now,
                updated_utc: now,
            })
            .await
            .unwrap();
        let user = Uuid::new_v4();

        let result = f
            .subscriptions
            .create_subscription(request(user, product.product_id))
            .await;

        assert!(matches!(result, Err(DomainError::Pricing(PricingOverflow))));
        assert!(f
            .subscriptions
            .list_user_subscriptions(user)
            .await
            .unwrap()
            .is_empty());
    }
}
