//! HTTP API layer
//!
//! - HTML pages (welcome, dashboard)
//! - Prometheus metrics

mod metrics;
pub(crate) mod pages;

pub use metrics::metrics_router;
pub use pages::pages_router;
