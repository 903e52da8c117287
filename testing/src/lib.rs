//! # Pulse Testing
//!
//! Testing utilities and helpers for the pulse reactive runtime.
//!
//! This crate provides:
//! - [`MockHttpClient`]: scripted responses for the polling and warmup drivers
//! - [`EventRecorder`]: captures everything published on a bus
//! - [`ModuleTest`]: Given-When-Then assertions for a module's reducer and trigger
//! - proptest strategies for events
//!
//! ## Example
//!
//! ```ignore
//! use pulse_testing::{EventRecorder, MockHttpClient};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_poll_emits_fulfilled() {
//!     let bus = Arc::new(BroadcastEventBus::default());
//!     let http = Arc::new(MockHttpClient::new());
//!     http.respond_with(json!({ "result": 1 }));
//!
//!     let recorder = EventRecorder::attach(bus.as_ref()).unwrap();
//!     // ... spawn a driver, publish HTTP_POLLING_STARTED ...
//!     let fulfilled = recorder.wait_for("HTTP_POLLING_REQUEST_FULFILLED", 1).await;
//! }
//! ```

mod module_test;

pub use module_test::{ModuleTest, assertions};
pub use mocks::{EventRecorder, MockHttpClient};

/// Mock implementations of environment traits
pub mod mocks {
    use futures::StreamExt;
    use pulse_core::environment::{HttpClient, HttpError, HttpRequest, HttpResponse};
    use pulse_core::{Event, EventBus, EventBusError};
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Mutex, MutexGuard, PoisonError};
    use std::time::Duration;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;

    type Reply = Result<Value, HttpError>;

    #[derive(Default)]
    struct Script {
        queued: VecDeque<Reply>,
        fallback: Option<Reply>,
        delay: Duration,
        requests: Vec<HttpRequest>,
    }

    /// HTTP client that answers from a script and records every request.
    ///
    /// Queued replies are consumed in order; once the queue is empty the fallback (if any)
    /// answers every request. Without either, requests fail with
    /// [`HttpError::RequestFailed`].
    ///
    /// # Example
    ///
    /// ```
    /// use pulse_core::environment::{HttpClient, HttpRequest};
    /// use pulse_testing::MockHttpClient;
    /// use serde_json::json;
    ///
    /// # tokio_test::block_on(async {
    /// let http = MockHttpClient::new();
    /// http.respond_with(json!({ "n": 1 }));
    ///
    /// let response = http.post(HttpRequest::new("http://x", json!({}))).await.unwrap();
    /// assert_eq!(response.data, json!({ "n": 1 }));
    /// assert_eq!(http.request_count(), 1);
    /// # });
    /// ```
    #[derive(Default)]
    pub struct MockHttpClient {
        script: Mutex<Script>,
    }

    impl MockHttpClient {
        /// Create a client with an empty script
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a successful reply
        pub fn respond_with(&self, data: Value) {
            self.lock().queued.push_back(Ok(data));
        }

        /// Queue a failed reply
        pub fn fail_with(&self, error: HttpError) {
            self.lock().queued.push_back(Err(error));
        }

        /// Answer every request with `data` once the queue is drained
        pub fn always_respond_with(&self, data: Value) {
            self.lock().fallback = Some(Ok(data));
        }

        /// Delay every reply by `delay` (uses tokio time, so paused clocks apply)
        pub fn set_delay(&self, delay: Duration) {
            self.lock().delay = delay;
        }

        /// Every request received so far
        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            self.lock().requests.clone()
        }

        /// Number of requests received so far
        #[must_use]
        pub fn request_count(&self) -> usize {
            self.lock().requests.len()
        }

        fn lock(&self) -> MutexGuard<'_, Script> {
            self.script.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl HttpClient for MockHttpClient {
        fn post(
            &self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + '_>> {
            let url = request.url.clone();
            let (reply, delay) = {
                let mut script = self.lock();
                script.requests.push(request);
                let reply = script
                    .queued
                    .pop_front()
                    .or_else(|| script.fallback.clone());
                (reply, script.delay)
            };

            Box::pin(async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                match reply {
                    Some(Ok(data)) => Ok(HttpResponse { status: 200, data }),
                    Some(Err(error)) => Err(error),
                    None => Err(HttpError::RequestFailed {
                        url,
                        reason: "no scripted response".to_string(),
                    }),
                }
            })
        }
    }

    /// Records every event published on a bus.
    ///
    /// The recording task is aborted when the recorder is dropped.
    pub struct EventRecorder {
        events: watch::Receiver<Vec<Event>>,
        task: JoinHandle<()>,
    }

    impl EventRecorder {
        /// Subscribe to `bus` and start recording.
        ///
        /// Must be called from within a Tokio runtime.
        ///
        /// # Errors
        ///
        /// Returns [`EventBusError`] if the bus is closed.
        pub fn attach(bus: &dyn EventBus) -> Result<Self, EventBusError> {
            let mut stream = bus.subscribe()?;
            let (sender, events) = watch::channel(Vec::new());

            let task = tokio::spawn(async move {
                while let Some(event) = stream.next().await {
                    sender.send_modify(|events| events.push(event));
                }
            });

            Ok(Self { events, task })
        }

        /// Everything recorded so far, in delivery order
        #[must_use]
        pub fn events(&self) -> Vec<Event> {
            self.events.borrow().clone()
        }

        /// Recorded events of one type
        #[must_use]
        pub fn of_type(&self, event_type: &str) -> Vec<Event> {
            self.events
                .borrow()
                .iter()
                .filter(|e| e.is(event_type))
                .cloned()
                .collect()
        }

        /// Number of recorded events of one type
        #[must_use]
        pub fn count(&self, event_type: &str) -> usize {
            self.events.borrow().iter().filter(|e| e.is(event_type)).count()
        }

        /// Wait until at least `n` events of `event_type` were recorded.
        ///
        /// Returns early, with whatever was recorded, if the bus closes. Otherwise waits
        /// indefinitely; wrap in `tokio::time::timeout`.
        pub async fn wait_for(&self, event_type: &str, n: usize) -> Vec<Event> {
            let mut events = self.events.clone();
            let _ = events
                .wait_for(|all| all.iter().filter(|e| e.is(event_type)).count() >= n)
                .await;
            self.of_type(event_type)
        }
    }

    impl Drop for EventRecorder {
        fn drop(&mut self) {
            self.task.abort();
        }
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use pulse_core::Event;

    /// Events drawn from a small vocabulary, each carrying an integer `n` field.
    pub fn arb_event() -> impl Strategy<Value = Event> {
        (prop::sample::select(vec!["a", "b", "c", "tick"]), -100i64..100)
            .prop_map(|(event_type, n)| Event::new(event_type).with_field("n", n))
    }

    /// Sequences of [`arb_event`] up to `max_len` long.
    pub fn arb_events(max_len: usize) -> impl Strategy<Value = Vec<Event>> {
        prop::collection::vec(arb_event(), 0..max_len)
    }
}

/// Install a test-friendly tracing subscriber honouring `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
