//! Prometheus scrape endpoint.

use crate::{AppError, AppState, WebResult};
use axum::extract::State;

/// Render the Prometheus exposition text.
///
/// # Errors
///
/// Returns 404 when metrics are disabled.
#[allow(clippy::unused_async)]
pub async fn render_metrics(State(app): State<AppState>) -> WebResult<String> {
    app.metrics
        .as_ref()
        .map(metrics_exporter_prometheus::PrometheusHandle::render)
        .ok_or_else(|| AppError::not_found("metrics are disabled"))
}
