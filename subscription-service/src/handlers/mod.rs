pub mod health;
pub mod products;
pub mod subscriptions;
pub mod vouchers;

pub use health::{health_check, metrics_handler, readiness_check};
