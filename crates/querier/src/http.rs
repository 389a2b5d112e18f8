use crate::metrics::QuerierMetrics;
use axum::{extract::State, response::IntoResponse, routing, Router};
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;

/// Create the HTTP router with metrics endpoint
pub fn create_router(metrics: Arc<QuerierMetrics>) -> Router {
    Router::new()
        .route("/metrics", routing::get(metrics_handler))
        .with_state(metrics)
}

/// Handler for GET /metrics
/// Returns Prometheus metrics in text format
async fn metrics_handler(State(metrics): State<Arc<QuerierMetrics>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    let metric_families = metrics.registry().gather();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4",
        )],
        buffer,
    )
        .into_response()
}
