//! Warmup request endpoint.

use super::PathRequest;
use crate::{AppError, AppState, WebResult};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use pulse_core::Event;
use pulse_core::event::types;

/// Publish a bare `WARMUP_REQUEST_RECIEVED` event and acknowledge with 202.
///
/// The event carries no payload, so the warmup driver reports it as
/// `WARMUP_REQUEST_FAILED`; richer callers publish onto the bus directly.
///
/// # Errors
///
/// Returns 400 if the body is not a JSON object and 503 if the runtime's bus is closed.
#[allow(clippy::unused_async)]
pub async fn request_warmup(
    State(app): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> WebResult<StatusCode> {
    let request = PathRequest::from_body(body)?;
    tracing::info!(path = ?request.path, "Warmup requested");
    app.runtime
        .publish(Event::new(types::WARMUP_REQUEST_RECIEVED))
        .map_err(|e| {
            AppError::unavailable("Runtime is not accepting events").with_source(e.into())
        })?;
    Ok(StatusCode::ACCEPTED)
}
