//! Application startup and lifecycle management.

use crate::config::{StorageBackend, SubscriptionConfig};
use crate::handlers::{self, products, subscriptions, vouchers};
use crate::middleware::TokenVerifier;
use crate::services::{
    init_metrics, Database, InMemoryStore, ProductService, Repositories, SubscriptionService,
    VoucherService,
};
use axum::{
    extract::FromRef,
    middleware,
    routing::{get, patch, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: SubscriptionConfig,
    pub repos: Repositories,
    pub products: ProductService,
    pub vouchers: VoucherService,
    pub subscriptions: SubscriptionService,
    pub verifier: TokenVerifier,
}

impl AppState {
    pub fn new(config: SubscriptionConfig, repos: Repositories) -> Self {
        let verifier = TokenVerifier::from_config(&config.auth);
        Self {
            products: ProductService::new(repos.products.clone()),
            vouchers: VoucherService::new(repos.vouchers.clone(), repos.products.clone()),
            subscriptions: SubscriptionService::new(repos.clone()),
            repos,
            verifier,
            config,
        }
    }
}

impl FromRef<AppState> for TokenVerifier {
    fn from_ref(state: &AppState) -> Self {
        state.verifier.clone()
    }
}

/// Build the HTTP router for `state`.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/products/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route("/vouchers/validate", post(vouchers::validate_voucher))
        .route(
            "/admin/vouchers",
            get(vouchers::list_vouchers).post(vouchers::create_voucher),
        )
        .route(
            "/admin/vouchers/:id",
            get(vouchers::get_voucher)
                .put(vouchers::update_voucher)
                .delete(vouchers::delete_voucher),
        )
        .route(
            "/admin/vouchers/product/:id",
            get(vouchers::list_vouchers_for_product),
        )
        .route(
            "/subscriptions",
            get(subscriptions::list_subscriptions).post(subscriptions::create_subscription),
        )
        .route("/subscriptions/:id", get(subscriptions::get_subscription))
        .route(
            "/subscriptions/:id/history",
            get(subscriptions::get_subscription_history),
        )
        .route(
            "/subscriptions/:id/pause",
            patch(subscriptions::pause_subscription),
        )
        .route(
            "/subscriptions/:id/unpause",
            patch(subscriptions::unpause_subscription),
        )
        .route(
            "/subscriptions/:id/cancel",
            patch(subscriptions::cancel_subscription),
        );

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    http_listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the storage backend named in `config`.
    /// The postgres backend runs pending migrations before serving.
    pub async fn build(config: SubscriptionConfig) -> Result<Self, AppError> {
        let repos = match config.storage_backend {
            StorageBackend::Postgres => {
                let db = Database::new(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;

                Repositories::from_backend(Arc::new(db))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data is lost on shutdown");
                Repositories::from_backend(Arc::new(InMemoryStore::new()))
            }
        };

        Self::build_with_repositories(config, repos).await
    }

    /// Build the application on top of already-constructed repositories.
    pub async fn build_with_repositories(
        config: SubscriptionConfig,
        repos: Repositories,
    ) -> Result<Self, AppError> {
        init_metrics();

        let http_addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let http_listener = TcpListener::bind(http_addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %http_addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = http_listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Subscription service listener bound");

        Ok(Self {
            http_port,
            http_listener,
            state: AppState::new(config, repos),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "subscription-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.http_listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
