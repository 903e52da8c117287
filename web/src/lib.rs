//! Axum HTTP facade for the pulse reactive runtime.
//!
//! The facade is a thin imperative shell over a running [`Runtime`](pulse_runtime::Runtime):
//!
//! ```text
//! POST /         → current state snapshot
//! POST /warmup   → publish WARMUP_REQUEST_RECIEVED (202)
//! GET  /health   → runtime health (200 | 503)
//! GET  /metrics  → Prometheus text (404 when disabled)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pulse_web::{AppState, router};
//!
//! let state = AppState::new(runtime).with_metrics(recorder.handle().cloned());
//! let listener = tokio::net::TcpListener::bind(addr).await?;
//! axum::serve(listener, router(state)).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

pub use error::AppError;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

/// Build the facade router over `state`.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(handlers::state::query_state))
        .route("/warmup", post(handlers::warmup::request_warmup))
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
