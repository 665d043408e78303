use prometheus::TEXT_FORMAT;
use service_core::axum::{http::header, response::IntoResponse};

/// Prometheus scrape endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, TEXT_FORMAT)],
        crate::services::metrics::get_metrics(),
    )
}
