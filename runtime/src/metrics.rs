//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for:
//! - Event bus publishing and subscriber lag
//! - Fold and feedback processing in the runtime loop
//! - Polling and warmup drivers
//!
//! # Example
//!
//! ```rust,no_run
//! use pulse_runtime::metrics::MetricsRecorder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // Later, e.g. from an HTTP handler:
//! let text = recorder.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other crates
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders the scrape output.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create a recorder that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the global recorder.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a warning and leaves
    /// [`handle`](Self::handle) empty.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the recorder hasn't been installed by this instance.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    // Event Bus Metrics
    describe_counter!(
        "event_bus_events_published_total",
        "Total number of events published to the event bus"
    );
    describe_counter!(
        "event_bus_publish_errors_total",
        "Total number of publishes rejected by a closed bus"
    );
    describe_counter!(
        "event_bus_lagged_total",
        "Total number of events skipped by lagging subscribers"
    );

    // Runtime Metrics
    describe_counter!("runtime_folds_total", "Total number of events folded into state");
    describe_histogram!(
        "runtime_fold_duration_seconds",
        "Time taken to fold one event"
    );
    describe_counter!(
        "runtime_triggered_events_total",
        "Total number of follow-up events republished by triggers"
    );

    // Polling Metrics
    describe_counter!(
        "polling_requests_total",
        "Total number of poll requests by outcome"
    );
    describe_counter!(
        "polling_deduplicated_total",
        "Total number of poll responses suppressed as unchanged"
    );
    describe_counter!("polling_active_started_total", "Total number of polls started");
    describe_counter!("polling_active_stopped_total", "Total number of polls stopped");

    // Warmup Metrics
    describe_counter!("warmup_armed_total", "Total number of TTL countdowns armed");
    describe_counter!(
        "warmup_superseded_total",
        "Total number of countdowns cancelled by a newer request"
    );
    describe_counter!(
        "warmup_expired_total",
        "Total number of countdowns that elapsed"
    );
    describe_counter!(
        "warmup_responses_total",
        "Total number of cache-warming requests by outcome"
    );
}

/// Event bus metrics recorder.
pub struct BusMetrics;

impl BusMetrics {
    /// Record a publish.
    pub fn record_publish() {
        counter!("event_bus_events_published_total").increment(1);
    }

    /// Record a publish rejected by a closed bus.
    pub fn record_publish_error() {
        counter!("event_bus_publish_errors_total").increment(1);
    }

    /// Record events skipped by a lagging subscriber.
    pub fn record_lagged(skipped: u64) {
        counter!("event_bus_lagged_total").increment(skipped);
    }
}

/// Runtime loop metrics recorder.
pub struct RuntimeMetrics;

impl RuntimeMetrics {
    /// Record one fold step.
    pub fn record_fold(duration: Duration) {
        counter!("runtime_folds_total").increment(1);
        histogram!("runtime_fold_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a republished trigger output.
    pub fn record_triggered() {
        counter!("runtime_triggered_events_total").increment(1);
    }
}

/// Polling driver metrics recorder.
pub struct PollingMetrics;

impl PollingMetrics {
    /// Record a poll request outcome (`fulfilled` or `failed`).
    pub fn record_request(outcome: &'static str) {
        counter!("polling_requests_total", "outcome" => outcome).increment(1);
    }

    /// Record a response suppressed by deduplication.
    pub fn record_deduplicated() {
        counter!("polling_deduplicated_total").increment(1);
    }

    /// Record a poll starting.
    pub fn record_started() {
        counter!("polling_active_started_total").increment(1);
    }

    /// Record a poll stopping.
    pub fn record_stopped() {
        counter!("polling_active_stopped_total").increment(1);
    }
}

/// Warmup driver metrics recorder.
pub struct WarmupMetrics;

impl WarmupMetrics {
    /// Record a countdown being armed.
    pub fn record_armed() {
        counter!("warmup_armed_total").increment(1);
    }

    /// Record a countdown cancelled by a newer request.
    pub fn record_superseded() {
        counter!("warmup_superseded_total").increment(1);
    }

    /// Record a countdown that elapsed.
    pub fn record_expired() {
        counter!("warmup_expired_total").increment(1);
    }

    /// Record a cache-warming request outcome (`fulfilled` or `failed`).
    pub fn record_response(outcome: &'static str) {
        counter!("warmup_responses_total", "outcome" => outcome).increment(1);
    }
}
