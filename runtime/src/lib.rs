//! # Pulse Runtime
//!
//! Runtime implementation for the pulse reactive runtime.
//!
//! This crate wires the pure pieces from `pulse-core` to an event bus and keeps the
//! resulting state available to readers.
//!
//! ## Core Components
//!
//! - **`BroadcastEventBus`**: in-process, replay-latest multicast bus
//! - **Runtime**: owns the reducer/trigger registries and runs the fold and feedback loops
//! - **`StateHandle`**: replay-latest view of the folded state for other tasks
//! - **Built-ins**: the `runtime` and `warmup` slices the runtime maintains itself
//!
//! ## Example
//!
//! ```ignore
//! use pulse_runtime::{BroadcastEventBus, Runtime};
//! use std::sync::Arc;
//!
//! let runtime = Runtime::new(Arc::new(BroadcastEventBus::default()));
//! runtime.register("prices", prices_module());
//! runtime.start()?;
//!
//! let prices = runtime.state()["modules"]["prices"].clone();
//! ```

/// Built-in `runtime` and `warmup` slices
pub mod builtins;

/// Deployment configuration
pub mod config;

/// Replay-latest broadcast event bus
pub mod event_bus;

/// Prometheus metrics for observability
pub mod metrics;

/// Fold and feedback loops
pub mod runtime_loop;

pub use event_bus::BroadcastEventBus;
pub use runtime_loop::{Runtime, StateHandle};

/// Error types for the runtime
pub mod error {
    use pulse_core::EventBusError;
    use thiserror::Error;

    /// Errors that can occur during runtime operations
    #[derive(Error, Debug)]
    pub enum RuntimeError {
        /// `start()` was called more than once
        #[error("Runtime already started")]
        AlreadyStarted,

        /// The event bus rejected a publish or subscribe
        ///
        /// Usually means the bus was closed by `shutdown()`.
        #[error("Event bus error: {0}")]
        Bus(#[from] EventBusError),

        /// A fold or feedback task panicked
        ///
        /// Reducers and triggers must not panic; this indicates a defect in one of them.
        #[error("Runtime task failed: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// The runtime was dropped while a reader was waiting on state
        #[error("Runtime stopped")]
        Stopped,
    }
}

pub use error::RuntimeError;

/// Health check status levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    /// Loops are running and the bus is open
    Healthy,

    /// The runtime has not been started yet
    Degraded,

    /// The bus is closed; no further events will be folded
    Unhealthy,
}

impl HealthStatus {
    /// Check if status is healthy
    #[must_use]
    pub const fn is_healthy(self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// Lowercase label used in health responses
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_labels() {
        assert!(HealthStatus::Healthy.is_healthy());
        assert!(!HealthStatus::Degraded.is_healthy());
        assert_eq!(HealthStatus::Unhealthy.to_string(), "unhealthy");
        assert!(HealthStatus::Healthy < HealthStatus::Unhealthy);
    }
}
