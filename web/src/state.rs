//! Application state shared by the facade handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use pulse_runtime::Runtime;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// The running runtime
    pub runtime: Arc<Runtime>,
    /// Prometheus handle, present only when metrics are enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create state over `runtime` with metrics disabled.
    #[must_use]
    pub const fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            metrics: None,
        }
    }

    /// Expose `/metrics` through `handle` (or keep it disabled with `None`).
    #[must_use]
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }
}
