//! # Pulse Drivers
//!
//! The imperative shell around the pure runtime. Drivers subscribe to the event bus, perform
//! I/O, and publish the outcome back as ordinary events.
//!
//! - [`PollingDriver`]: `HTTP_POLLING_STARTED` → periodic POSTs → `HTTP_POLLING_REQUEST_*`
//! - [`WarmupDriver`]: `WARMUP_REQUEST_RECIEVED` → TTL countdown → `WARMUP_RESPONSE_*`
//! - [`ReqwestHttpClient`]: the production [`HttpClient`](pulse_core::environment::HttpClient)
//!
//! Drivers never surface errors to their callers once running; every failure becomes a
//! failure event carrying the correlating key.

/// `reqwest` HTTP client
pub mod http;

/// Polling driver
pub mod polling;

/// Warmup driver
pub mod warmup;

pub use http::ReqwestHttpClient;
pub use polling::PollingDriver;
pub use warmup::WarmupDriver;
