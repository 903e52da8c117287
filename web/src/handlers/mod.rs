//! HTTP request handlers.

pub mod health;
pub mod metrics;
pub mod state;
pub mod warmup;

use crate::{AppError, WebResult};
use axum::Json;
use axum::extract::rejection::JsonRejection;
use serde::Deserialize;

/// Request body accepted by `POST /` and `POST /warmup`.
///
/// `path` is informational only; it is logged and otherwise ignored.
#[derive(Debug, Default, Deserialize)]
pub struct PathRequest {
    /// Caller-supplied path
    #[serde(default)]
    pub path: Option<String>,
}

impl PathRequest {
    /// Turn axum's JSON extraction result into a request or a 400 `AppError`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::bad_request`] when the body is missing, not JSON, or mis-shaped.
    pub fn from_body(body: Result<Json<Self>, JsonRejection>) -> WebResult<Self> {
        body.map(|Json(request)| request)
            .map_err(|rejection| AppError::bad_request(rejection.body_text()))
    }
}
