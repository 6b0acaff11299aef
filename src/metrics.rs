//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authentication Metrics
    pub static ref LOGINS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("octolink_logins_total", "Total number of login attempts"),
        &["method", "outcome"]
    ).expect("metric can be created");
    pub static ref REGISTRATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("octolink_registrations_total", "Total number of local registrations"),
        &["outcome"]
    ).expect("metric can be created");
    pub static ref IDENTITY_RESOLUTIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "octolink_identity_resolutions_total",
            "External identity resolutions by outcome"
        ),
        &["outcome"]
    ).expect("metric can be created");

    // Application Metrics
    pub static ref USERS_TOTAL: IntGauge = IntGauge::new(
        "octolink_users_total",
        "Total number of stored accounts"
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("octolink_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGINS_TOTAL.clone()))
            .expect("LOGINS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(REGISTRATIONS_TOTAL.clone()))
            .expect("REGISTRATIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(IDENTITY_RESOLUTIONS_TOTAL.clone()))
            .expect("IDENTITY_RESOLUTIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(USERS_TOTAL.clone()))
            .expect("USERS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}

/// Record a login attempt.
pub fn observe_login(method: &str, outcome: &str) {
    LOGINS_TOTAL.with_label_values(&[method, outcome]).inc();
}

/// Record an identity resolution outcome.
pub fn observe_resolution(outcome: &str) {
    IDENTITY_RESOLUTIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
}
