//! Prometheus scrape endpoint
//!
//! `/metrics` is only mounted when `metrics.token` is configured, and every
//! scrape must present that token as a bearer credential.

use axum::{
    Router,
    http::{StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus::{Encoder, TextEncoder};

use crate::AppState;
use crate::auth::require_metrics_token;
use crate::metrics::REGISTRY;

/// GET /metrics
async fn scrape() -> Response {
    let encoder = TextEncoder::new();

    match encoder.encode_to_string(&REGISTRY.gather()) {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Create metrics router
///
/// Empty when no scrape token is configured.
pub fn metrics_router(state: AppState) -> Router<AppState> {
    if state.config.metrics.token().is_none() {
        tracing::info!("metrics.token is not set; /metrics is disabled");
        return Router::new();
    }

    Router::new()
        .route("/metrics", get(scrape))
        .route_layer(middleware::from_fn_with_state(state, require_metrics_token))
}
