//! Prometheus metrics for key loading
//!
//! Counts load attempts by outcome and tracks the size of the live key set.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_int_counter, register_int_counter_vec, register_int_gauge, Encoder,
    IntCounter, IntCounterVec, IntGauge, Registry, TextEncoder,
};
use std::sync::Once;
use tracing::debug;

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref REGISTRY: Registry = Registry::new();

    /// Total number of key file loads by outcome
    /// Labels: outcome (committed, rejected, too_many_errors, unreadable)
    pub static ref KEY_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("key_loads_total", "Total number of key file loads"),
        &["outcome"]
    )
    .expect("Failed to create key_loads_total metric");

    /// Malformed entries seen across all rejected loads
    pub static ref KEY_LOAD_ERRORS_TOTAL: IntCounter = register_int_counter!(
        opts!("key_load_errors_total", "Total number of malformed key file entries")
    )
    .expect("Failed to create key_load_errors_total metric");

    /// Keys in the currently active key set
    pub static ref KEYS_ACTIVE: IntGauge = register_int_gauge!(
        opts!("keys_active", "Number of keys in the active key set")
    )
    .expect("Failed to create keys_active metric");
}

static INIT: Once = Once::new();

/// Register all metrics with [`REGISTRY`]; later calls do nothing
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(KEY_LOADS_TOTAL.clone()))
            .expect("Failed to register key_loads_total");
        REGISTRY
            .register(Box::new(KEY_LOAD_ERRORS_TOTAL.clone()))
            .expect("Failed to register key_load_errors_total");
        REGISTRY
            .register(Box::new(KEYS_ACTIVE.clone()))
            .expect("Failed to register keys_active");

        debug!("Prometheus metrics registry initialized");
    });
}

/// Record one load attempt
pub fn record_key_load(outcome: &str, errors: u32) {
    KEY_LOADS_TOTAL.with_label_values(&[outcome]).inc();
    KEY_LOAD_ERRORS_TOTAL.inc_by(u64::from(errors));

    debug!(outcome = %outcome, errors = errors, "Recorded key load metric");
}

/// Set the size of the live key set
pub fn set_active_keys(count: usize) {
    KEYS_ACTIVE.set(i64::try_from(count).unwrap_or(i64::MAX));
}

/// Gather all metrics and encode them in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics to UTF-8: {}", e))
}
