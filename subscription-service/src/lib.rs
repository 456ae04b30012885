//! subscription-service: product catalog, vouchers, pricing and the
//! subscription lifecycle behind an axum HTTP API.

pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
