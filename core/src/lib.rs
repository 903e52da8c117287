//! # Pulse Core
//!
//! Core traits and types for the pulse reactive runtime.
//!
//! Pulse aggregates periodically polled data sources into derived state and keeps remote
//! response caches warm. Everything flows through one event bus:
//!
//! - **Event**: an immutable `{type, ...fields}` record
//! - **State**: a JSON mapping whose top-level keys partition ownership
//! - **Reducer**: pure fold `(State, Event) → State`
//! - **Trigger**: pure `(State, Event) → [Event]`; outputs are fed back onto the bus
//! - **Module**: a reducer/trigger pair registered under a unique key
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Reducers and triggers never perform I/O; drivers translate events to and from the outside
//! - Failure is data: drivers turn errors into events carrying a correlating key
//!
//! ## Example
//!
//! ```
//! use pulse_core::trigger::Triggered;
//! use pulse_core::{Event, Module, State, smallvec};
//! use serde_json::json;
//!
//! let module = Module::new(
//!     |s: State, e: &Event| if e.is("start") { json!("ready") } else { s },
//!     |_s: &State, e: &Event| -> Triggered {
//!         if e.is("start") {
//!             smallvec![Event::new("HTTP_POLLING_STOPPED")]
//!         } else {
//!             smallvec![]
//!         }
//!     },
//! );
//! # let _ = module;
//! ```

// Re-export commonly used types
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer and trigger composition
pub mod composition;

/// Events and the core event vocabulary
pub mod event;

/// Event bus abstraction
pub mod event_bus;

/// Modules: the unit of external extension
pub mod module;

/// Runtime-mutable reducer/trigger registries
pub mod registry;

/// State slices and helpers
pub mod state;

pub use event::Event;
pub use event_bus::{EventBus, EventBusError, EventStream};
pub use module::Module;
pub use registry::{ReducerRegistry, Registry, RegistryOp, RegistryOutcome, TriggerRegistry};
pub use state::State;

/// Reducer module - the fold at the heart of the runtime
///
/// Reducers are pure functions: `(State, Event) → State`.
///
/// They take the current slice by value and return the next one. Callers that still hold a
/// previous snapshot keep a valid value; nothing is mutated behind their back.
pub mod reducer {
    use crate::event::Event;
    use crate::state::State;

    /// The Reducer trait - pure state transition
    ///
    /// Implemented for any `Fn(State, &Event) -> State + Send + Sync`, so plain closures can be
    /// registered directly.
    ///
    /// # Example
    ///
    /// ```
    /// use pulse_core::reducer::Reducer;
    /// use pulse_core::{Event, State};
    /// use serde_json::json;
    ///
    /// struct LastType;
    ///
    /// impl Reducer for LastType {
    ///     fn reduce(&self, _state: State, event: &Event) -> State {
    ///         json!(event.event_type())
    ///     }
    /// }
    ///
    /// assert_eq!(LastType.reduce(json!({}), &Event::start()), json!("start"));
    /// ```
    pub trait Reducer: Send + Sync {
        /// Fold one event into the slice.
        ///
        /// Must not perform I/O and must not panic; a panic here is a defect, not a
        /// recoverable condition.
        fn reduce(&self, state: State, event: &Event) -> State;
    }

    impl<F> Reducer for F
    where
        F: Fn(State, &Event) -> State + Send + Sync,
    {
        fn reduce(&self, state: State, event: &Event) -> State {
            self(state, event)
        }
    }
}

/// Trigger module - follow-up events derived from state and the incoming event
pub mod trigger {
    use crate::event::Event;
    use crate::state::State;
    use smallvec::SmallVec;

    /// Follow-up events produced by a single trigger invocation.
    pub type Triggered = SmallVec<[Event; 4]>;

    /// The Trigger trait - pure `(State, Event) → [Event]`
    ///
    /// The runtime republishes everything a trigger returns. Triggers that need I/O return a
    /// regular event that a driver downstream recognizes.
    pub trait Trigger: Send + Sync {
        /// Compute follow-up events; may return zero, one, or many.
        fn trigger(&self, state: &State, event: &Event) -> Triggered;
    }

    impl<F> Trigger for F
    where
        F: Fn(&State, &Event) -> Triggered + Send + Sync,
    {
        fn trigger(&self, state: &State, event: &Event) -> Triggered {
            self(state, event)
        }
    }

    /// A trigger that never produces anything.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NoTrigger;

    impl Trigger for NoTrigger {
        fn trigger(&self, _state: &State, _event: &Event) -> Triggered {
            Triggered::new()
        }
    }
}

/// Environment module - dependency injection traits
///
/// All outbound I/O performed by drivers goes through these traits so tests can swap in
/// scripted implementations.
pub mod environment {
    use serde_json::Value;
    use std::future::Future;
    use std::pin::Pin;
    use thiserror::Error;

    /// An outbound JSON POST.
    #[derive(Debug, Clone, PartialEq)]
    pub struct HttpRequest {
        /// Target URL
        pub url: String,
        /// JSON body
        pub body: Value,
        /// Optional API key, sent as `x-api-key`
        pub api_key: Option<String>,
    }

    impl HttpRequest {
        /// A request without an API key.
        #[must_use]
        pub fn new(url: impl Into<String>, body: Value) -> Self {
            Self {
                url: url.into(),
                body,
                api_key: None,
            }
        }

        /// Attach an API key; empty keys are ignored.
        #[must_use]
        pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
            let api_key = api_key.into();
            self.api_key = (!api_key.is_empty()).then_some(api_key);
            self
        }
    }

    /// A decoded HTTP response.
    #[derive(Debug, Clone, PartialEq)]
    pub struct HttpResponse {
        /// HTTP status code
        pub status: u16,
        /// Decoded JSON body
        pub data: Value,
    }

    /// Errors from outbound HTTP calls.
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum HttpError {
        /// The request could not be sent or the connection failed
        #[error("Request to {url} failed: {reason}")]
        RequestFailed {
            /// Target URL
            url: String,
            /// Transport error
            reason: String,
        },

        /// The request did not complete within the configured timeout
        #[error("Request to {url} timed out")]
        Timeout {
            /// Target URL
            url: String,
        },

        /// The responder answered with a non-success status
        #[error("{url} responded with status {status}")]
        Status {
            /// Target URL
            url: String,
            /// Status code
            status: u16,
        },

        /// The response body was not valid JSON
        #[error("Invalid response body from {url}: {reason}")]
        InvalidBody {
            /// Target URL
            url: String,
            /// Decode error
            reason: String,
        },
    }

    /// HTTP client used by the polling and warmup drivers.
    ///
    /// Uses an explicit boxed future so `Arc<dyn HttpClient>` works.
    pub trait HttpClient: Send + Sync {
        /// POST a JSON body and decode the JSON response.
        ///
        /// # Errors
        ///
        /// Returns an [`HttpError`] describing the transport, status, or decode failure.
        fn post(
            &self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + '_>>;
    }
}

#[cfg(test)]
mod tests {
    use super::environment::HttpRequest;
    use serde_json::Value;

    #[test]
    fn test_empty_api_key_is_dropped() {
        let request = HttpRequest::new("http://x", Value::Null).with_api_key("");
        assert_eq!(request.api_key, None);

        let request = HttpRequest::new("http://x", Value::Null).with_api_key("secret");
        assert_eq!(request.api_key.as_deref(), Some("secret"));
    }
}
