//! Metrics module for subscription-service.
//! Prometheus metrics for catalog, voucher and subscription operations.
//!
//! Request metrics from the shared HTTP middleware go through the `metrics`
//! facade; its recorder is rendered alongside the registry on /metrics.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    histogram_opts, opts, register_counter_vec, register_histogram_vec, register_int_counter_vec,
    CounterVec, Encoder, HistogramVec, IntCounterVec, TextEncoder,
};
use std::sync::OnceLock;

/// Database query duration histogram
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "subscription_db_query_duration_seconds",
            "Database query duration"
        ),
        &["operation"]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Product catalog operations counter
pub static PRODUCT_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Subscription operations counter by outcome
pub static SUBSCRIPTION_OPERATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Voucher validations counter by outcome
pub static VOUCHER_VALIDATIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Optimistic-concurrency retries
pub static CONCURRENCY_RETRIES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Error counter for alerting
pub static ERRORS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Billed amount of created subscriptions
pub static BILLED_AMOUNT_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Recorder behind the `metrics` facade (`http_requests_total` and friends).
pub static HTTP_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize all metrics. Call once at startup; repeated calls are no-ops.
pub fn init_metrics() {
    HTTP_METRICS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("Failed to install Prometheus recorder")
    });

    PRODUCT_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_product_operations_total",
                "Total product catalog operations by type"
            ),
            &["operation"]
        )
        .expect("Failed to register PRODUCT_OPERATIONS_TOTAL")
    });

    SUBSCRIPTION_OPERATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_operations_total",
                "Total subscription operations by type and outcome"
            ),
            &["operation", "outcome"]
        )
        .expect("Failed to register SUBSCRIPTION_OPERATIONS_TOTAL")
    });

    VOUCHER_VALIDATIONS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_voucher_validations_total",
                "Total voucher eligibility checks by outcome"
            ),
            &["outcome"]
        )
        .expect("Failed to register VOUCHER_VALIDATIONS_TOTAL")
    });

    CONCURRENCY_RETRIES_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!(
                "subscription_concurrency_retries_total",
                "Transitions retried after a stale version"
            ),
            &["operation"]
        )
        .expect("Failed to register CONCURRENCY_RETRIES_TOTAL")
    });

    ERRORS_TOTAL.get_or_init(|| {
        register_int_counter_vec!(
            opts!("subscription_errors_total", "Total errors by type for alerting"),
            &["error_type", "operation"]
        )
        .expect("Failed to register ERRORS_TOTAL")
    });

    BILLED_AMOUNT_TOTAL.get_or_init(|| {
        register_counter_vec!(
            opts!(
                "subscription_billed_amount_total",
                "Total amount of created subscriptions by product"
            ),
            &["product_id"]
        )
        .expect("Failed to register BILLED_AMOUNT_TOTAL")
    });

    // Force initialization of lazy statics
    let _ = &*DB_QUERY_DURATION;
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    let mut output = String::from_utf8(buffer).unwrap_or_default();
    if let Some(handle) = HTTP_METRICS_HANDLE.get() {
        output.push_str(&handle.render());
    }
    output
}

/// Record a product catalog operation.
pub fn record_product_operation(operation: &str) {
    if let Some(counter) = PRODUCT_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record a subscription operation with its outcome.
pub fn record_subscription_operation(operation: &str, outcome: &str) {
    if let Some(counter) = SUBSCRIPTION_OPERATIONS_TOTAL.get() {
        counter.with_label_values(&[operation, outcome]).inc();
    }
}

/// Record a voucher eligibility check.
pub fn record_voucher_validation(outcome: &str) {
    if let Some(counter) = VOUCHER_VALIDATIONS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record a retried transition.
pub fn record_concurrency_retry(operation: &str) {
    if let Some(counter) = CONCURRENCY_RETRIES_TOTAL.get() {
        counter.with_label_values(&[operation]).inc();
    }
}

/// Record an error for alerting.
pub fn record_error(error_type: &str, operation: &str) {
    if let Some(counter) = ERRORS_TOTAL.get() {
        counter.with_label_values(&[error_type, operation]).inc();
    }
}

/// Record the billed total of a new subscription.
pub fn record_billed_amount(product_id: &str, amount: f64) {
    if let Some(counter) = BILLED_AMOUNT_TOTAL.get() {
        counter.with_label_values(&[product_id]).inc_by(amount.abs());
    }
}
