//! Health check endpoint.
//!
//! Used by load balancers and monitoring systems to verify the runtime is still folding events.

use crate::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use pulse_runtime::HealthStatus;
use serde::Serialize;

/// Health response body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unhealthy`
    pub status: &'static str,
}

/// Report runtime health.
///
/// # Status Codes
///
/// - 200 OK: Healthy
/// - 503 Service Unavailable: Degraded (not started) or Unhealthy (bus closed)
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// { "status": "healthy" }
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check(State(app): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let health = app.runtime.health();
    (status_code(health), Json(HealthResponse { status: health.as_str() }))
}

const fn status_code(health: HealthStatus) -> StatusCode {
    if health.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
