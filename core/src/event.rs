//! Events: the unit of communication on the bus.
//!
//! An [`Event`] is a `type` tag plus a free-form JSON payload. Events are immutable once
//! published; nothing identifies an event beyond its fields, and the same `type` may carry
//! payloads of different shapes.
//!
//! On the wire an event is a flat JSON object:
//!
//! ```
//! use pulse_core::event::{Event, types};
//!
//! let event = Event::new(types::WARMUP_RESPONSE_REQUESTED).with_field("key", "abc");
//! let json = serde_json::to_value(&event).unwrap();
//! assert_eq!(json, serde_json::json!({ "type": "WARMUP_RESPONSE_REQUESTED", "key": "abc" }));
//! ```

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

/// Error types for event payload operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// A payload could not be turned into JSON.
    #[error("Failed to serialize payload for '{event_type}': {reason}")]
    SerializationError {
        /// Type of the event being built
        event_type: String,
        /// Underlying serde error
        reason: String,
    },

    /// The payload serialized to something other than a JSON object.
    #[error("Payload for '{0}' is not a JSON object")]
    NotAnObject(String),

    /// The payload did not match the requested shape.
    #[error("Failed to decode payload of '{event_type}': {reason}")]
    DeserializationError {
        /// Type of the event being decoded
        event_type: String,
        /// Underlying serde error
        reason: String,
    },
}

/// Event type tags produced and consumed at the core boundary.
pub mod types {
    /// Published once when the runtime starts.
    pub const START: &str = "start";
    /// Bumps the restart counter in the `runtime` slice.
    pub const RESTART: &str = "restart";

    /// Begin polling an HTTP endpoint.
    pub const HTTP_POLLING_STARTED: &str = "HTTP_POLLING_STARTED";
    /// Stop polling (matched by interval, not by key).
    pub const HTTP_POLLING_STOPPED: &str = "HTTP_POLLING_STOPPED";
    /// A poll produced a response that differs from the previous one.
    pub const HTTP_POLLING_REQUEST_FULFILLED: &str = "HTTP_POLLING_REQUEST_FULFILLED";
    /// A poll request failed; that poll has ended.
    pub const HTTP_POLLING_REQUEST_FAILED: &str = "HTTP_POLLING_REQUEST_FAILED";

    /// A responder asked to have its cache kept warm. The spelling is part of the wire format.
    pub const WARMUP_REQUEST_RECIEVED: &str = "WARMUP_REQUEST_RECIEVED";
    /// A warmup registration was armed.
    pub const WARMUP_REQUEST_FULFILLED: &str = "WARMUP_REQUEST_FULFILLED";
    /// A warmup registration could not be armed.
    pub const WARMUP_REQUEST_FAILED: &str = "WARMUP_REQUEST_FAILED";
    /// A TTL elapsed; a cache-warming request should be sent.
    pub const WARMUP_RESPONSE_REQUESTED: &str = "WARMUP_RESPONSE_REQUESTED";
    /// The cache-warming request succeeded.
    pub const WARMUP_RESPONSE_FULFILLED: &str = "WARMUP_RESPONSE_FULFILLED";
    /// The cache-warming request failed.
    pub const WARMUP_RESPONSE_FAILED: &str = "WARMUP_RESPONSE_FAILED";
}

/// An immutable record with a `type` tag and free-form payload fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Event {
    /// Create an event with an empty payload.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
        }
    }

    /// Create an event whose payload fields come from a serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::SerializationError`] if the payload cannot be serialized and
    /// [`EventError::NotAnObject`] if it does not serialize to a JSON object.
    pub fn with_payload<P: Serialize>(
        event_type: impl Into<String>,
        payload: &P,
    ) -> Result<Self, EventError> {
        let event_type = event_type.into();
        let value =
            serde_json::to_value(payload).map_err(|e| EventError::SerializationError {
                event_type: event_type.clone(),
                reason: e.to_string(),
            })?;

        match value {
            Value::Object(payload) => Ok(Self {
                event_type,
                payload,
            }),
            _ => Err(EventError::NotAnObject(event_type)),
        }
    }

    /// The synthetic event that seeds the fold.
    #[must_use]
    pub fn start() -> Self {
        Self::new(types::START)
    }

    /// Bumps the runtime restart counter.
    #[must_use]
    pub fn restart() -> Self {
        Self::new(types::RESTART)
    }

    /// Builder-style payload field.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// The `type` tag.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Whether this event carries the given `type` tag.
    #[must_use]
    pub fn is(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }

    /// A single payload field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// A string payload field.
    #[must_use]
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// All payload fields.
    #[must_use]
    pub const fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Decode the payload into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DeserializationError`] if the payload does not match `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(Value::Object(self.payload.clone())).map_err(|e| {
            EventError::DeserializationError {
                event_type: self.event_type.clone(),
                reason: e.to_string(),
            }
        })
    }
}

/// Typed payloads for the core event vocabulary.
pub mod payload {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// Payload of [`HTTP_POLLING_STARTED`](super::types::HTTP_POLLING_STARTED).
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct HttpPollingStarted {
        /// Requests per second; must be positive
        pub rate_limit: f64,
        /// Endpoint to poll
        pub url: String,
        /// JSON body posted on every poll
        #[serde(default)]
        pub body: Value,
        /// API key forwarded with each request (empty for none)
        #[serde(default)]
        pub api_key: String,
        /// Correlation key copied onto every fulfilled event
        pub key: String,
    }

    impl HttpPollingStarted {
        /// Tick interval in milliseconds derived from the rate limit (`1000 / rateLimit`).
        ///
        /// Returns `None` for a rate limit that is zero, negative, or not finite.
        #[must_use]
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        pub fn interval_ms(&self) -> Option<u64> {
            if !self.rate_limit.is_finite() || self.rate_limit <= 0.0 {
                return None;
            }
            let millis = (1000.0 / self.rate_limit).round();
            // Sub-millisecond intervals are clamped so the ticker never spins.
            Some((millis as u64).max(1))
        }
    }

    /// Payload of [`HTTP_POLLING_STOPPED`](super::types::HTTP_POLLING_STOPPED).
    #[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HttpPollingStopped {
        /// Interval (ms) of the polls to stop; absent only stops default-interval polls
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub interval: Option<u64>,
    }

    /// Payload of [`HTTP_POLLING_REQUEST_FULFILLED`](super::types::HTTP_POLLING_REQUEST_FULFILLED).
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct HttpPollingRequestFulfilled {
        /// HTTP status of the response
        pub status: u16,
        /// Decoded response body
        pub data: Value,
        /// Correlation key of the poll
        pub key: String,
    }

    /// Payload of [`HTTP_POLLING_REQUEST_FAILED`](super::types::HTTP_POLLING_REQUEST_FAILED).
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct HttpPollingRequestFailed {
        /// Correlation key of the poll
        pub key: String,
        /// Human-readable failure
        pub error: String,
    }

    /// Payload of [`WARMUP_REQUEST_RECIEVED`](super::types::WARMUP_REQUEST_RECIEVED).
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct WarmupRequestReceived {
        /// Responder whose cache should be kept warm
        pub url: String,
        /// Body to send when warming the cache
        #[serde(default)]
        pub body: Value,
        /// Time to live in milliseconds; reset by every same-key request
        pub ttl: u64,
        /// Indexable metadata about the responder
        #[serde(default)]
        pub meta: Value,
    }

    impl WarmupRequestReceived {
        /// Tracking key: the URL followed by the compact JSON body.
        ///
        /// `serde_json` keeps object keys sorted, so equal bodies always serialize the same way.
        #[must_use]
        pub fn hash_key(&self) -> String {
            format!("{}{}", self.url, self.body)
        }
    }

    /// Payload carrying only a warmup tracking key.
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    pub struct WarmupKey {
        /// Tracking key from [`WarmupRequestReceived::hash_key`]
        pub key: String,
    }
}
