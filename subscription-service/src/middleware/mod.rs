pub mod auth;

pub use auth::{AccessClaims, AuthenticatedUser, TokenVerifier};
