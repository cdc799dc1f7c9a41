//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{Counter, IntCounterVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Mirror pipeline
    pub static ref MIRROR_RESULTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("studio_mirror_results_total", "Total number of single-image mirror calls"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref FETCH_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("studio_mirror_fetch_attempts_total", "Total number of upstream fetch attempts per proxy route"),
        &["route", "outcome"]
    ).expect("metric can be created");
    pub static ref BYTES_UPLOADED: Counter = Counter::new(
        "studio_mirror_bytes_uploaded_total",
        "Total bytes uploaded to the object store"
    ).expect("metric can be created");
    pub static ref BULK_ITEMS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("studio_mirror_bulk_items_total", "Total number of items seen by bulk runs"),
        &["outcome"]
    ).expect("metric can be created");

    // Relays
    pub static ref RELAY_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("studio_mirror_relay_requests_total", "Total number of relayed third-party requests"),
        &["relay", "status"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("studio_mirror_errors_total", "Total number of errors returned to clients"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: std::sync::Once = std::sync::Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(register_all);
}

fn register_all() {
    REGISTRY
        .register(Box::new(MIRROR_RESULTS_TOTAL.clone()))
        .expect("MIRROR_RESULTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(FETCH_ATTEMPTS_TOTAL.clone()))
        .expect("FETCH_ATTEMPTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(BYTES_UPLOADED.clone()))
        .expect("BYTES_UPLOADED can be registered");
    REGISTRY
        .register(Box::new(BULK_ITEMS_TOTAL.clone()))
        .expect("BULK_ITEMS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(RELAY_REQUESTS_TOTAL.clone()))
        .expect("RELAY_REQUESTS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ERRORS_TOTAL.clone()))
        .expect("ERRORS_TOTAL can be registered");

    tracing::info!("Metrics registry initialized");
}
