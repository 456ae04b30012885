pub mod products;
pub mod subscriptions;
pub mod vouchers;

pub use products::ProductRequest;
pub use subscriptions::{CreateSubscriptionRequest, TransitionResponse};
pub use vouchers::{ValidateVoucherRequest, ValidateVoucherResponse, VoucherRequest};
