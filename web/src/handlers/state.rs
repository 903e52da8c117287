//! State query endpoint.

use super::PathRequest;
use crate::{AppState, WebResult};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde_json::Value;

/// Return the whole current state snapshot.
///
/// # Endpoint
///
/// ```text
/// POST /
/// { "path": "modules.ccc-eth-usd" }
/// ```
///
/// # Errors
///
/// Returns 400 if the body is not a JSON object.
#[allow(clippy::unused_async)]
pub async fn query_state(
    State(app): State<AppState>,
    body: Result<Json<PathRequest>, JsonRejection>,
) -> WebResult<Json<Value>> {
    let request = PathRequest::from_body(body)?;
    tracing::debug!(path = ?request.path, "State queried");
    Ok(Json(app.runtime.state().as_ref().clone()))
}
