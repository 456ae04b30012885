//! Services module for subscription-service.

pub mod database;
pub mod eligibility;
pub mod lifecycle;
pub mod memory;
pub mod metrics;
pub mod pricing;
pub mod products;
pub mod repository;
pub mod subscriptions;
pub mod vouchers;

pub use database::Database;
pub use eligibility::{check_voucher_eligibility, VoucherIneligibility};
pub use lifecycle::{apply_transition, Transition, TransitionError, TransitionOutcome};
pub use memory::InMemoryStore;
pub use metrics::{
    get_metrics, init_metrics, record_billed_amount, record_concurrency_retry, record_error,
    record_product_operation, record_subscription_operation, record_voucher_validation,
};
pub use pricing::{compute_pricing, Pricing, PricingOverflow};
pub use products::ProductService;
pub use repository::{
    ProductRepository, Repositories, SubscriptionRepository, VoucherRepository, WriteOutcome,
};
pub use subscriptions::SubscriptionService;
pub use vouchers::{VoucherService, VoucherValidation};
