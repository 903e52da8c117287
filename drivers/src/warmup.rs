//! Warmup driver: keeps a responder's cache warm by re-requesting before its TTL lapses.
//!
//! Per tracking key (`url` + compact JSON `body`) the driver runs a small state machine:
//!
//! ```text
//! Idle ──RECIEVED──▶ Armed ──ttl elapsed──▶ RESPONSE_REQUESTED ──▶ Fulfilled | Failed
//!                      │  ▲
//!                      └──┘ RECIEVED for the same key: cancel, arm again
//! ```
//!
//! Each arming is a task racing its TTL sleep against a cancel signal. Superseding an arming
//! sends the cancel and aborts the task, so a stale timer can never fire late.

use futures::StreamExt;
use pulse_core::environment::{HttpClient, HttpRequest};
use pulse_core::event::payload::{WarmupKey, WarmupRequestReceived};
use pulse_core::event::types;
use pulse_core::{Event, EventBus, EventBusError, EventStream, State};
use pulse_runtime::StateHandle;
use pulse_runtime::builtins::WARMUP_KEY;
use pulse_runtime::metrics::WarmupMetrics;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Arming {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Arms TTL countdowns and fires cache-warming requests when they elapse.
pub struct WarmupDriver {
    bus: Arc<dyn EventBus>,
    http: Arc<dyn HttpClient>,
    state: StateHandle,
}

impl WarmupDriver {
    /// Create a driver that reads tracked requests through `state`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, http: Arc<dyn HttpClient>, state: StateHandle) -> Self {
        Self { bus, http, state }
    }

    /// Subscribe to the bus and run the driver until the bus closes.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] if the bus is already closed.
    pub fn spawn(self) -> Result<JoinHandle<()>, EventBusError> {
        let events = self.bus.subscribe()?;
        Ok(tokio::spawn(self.run(events)))
    }

    async fn run(self, mut events: EventStream) {
        let mut armed: HashMap<String, Arming> = HashMap::new();

        while let Some(event) = events.next().await {
            armed.retain(|_, arming| !arming.task.is_finished());

            match event.event_type() {
                types::WARMUP_REQUEST_RECIEVED => self.arm(&event, &mut armed),
                types::WARMUP_RESPONSE_REQUESTED => self.respond(&event),
                _ => {}
            }
        }

        for arming in armed.into_values() {
            arming.task.abort();
        }
        tracing::debug!("Warmup driver finished: event bus closed");
    }

    fn arm(&self, event: &Event, armed: &mut HashMap<String, Arming>) {
        let request = match event.payload_as::<WarmupRequestReceived>() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Could not arm warmup request");
                publish(
                    self.bus.as_ref(),
                    Event::new(types::WARMUP_REQUEST_FAILED).with_field("error", e.to_string()),
                );
                return;
            }
        };
        let key = request.hash_key();

        if let Some(previous) = armed.remove(&key) {
            let _ = previous.cancel.send(());
            previous.task.abort();
            WarmupMetrics::record_superseded();
            tracing::debug!(%key, "Warmup countdown superseded");
        }

        let (cancel, cancelled) = oneshot::channel();
        let task = tokio::spawn(countdown(
            Arc::clone(&self.bus),
            key.clone(),
            Duration::from_millis(request.ttl),
            cancelled,
        ));
        armed.insert(key.clone(), Arming { cancel, task });

        WarmupMetrics::record_armed();
        tracing::debug!(%key, ttl_ms = request.ttl, "Warmup countdown armed");
        publish(
            self.bus.as_ref(),
            Event::new(types::WARMUP_REQUEST_FULFILLED).with_field("key", key),
        );
    }

    fn respond(&self, event: &Event) {
        let key = match event.payload_as::<WarmupKey>() {
            Ok(WarmupKey { key }) => key,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring warmup response request without key");
                return;
            }
        };

        let tracked = tracked_request(&self.state.snapshot(), &key);
        tokio::spawn(warm(
            Arc::clone(&self.bus),
            Arc::clone(&self.http),
            key,
            tracked,
        ));
    }
}

async fn countdown(
    bus: Arc<dyn EventBus>,
    key: String,
    ttl: Duration,
    cancelled: oneshot::Receiver<()>,
) {
    tokio::select! {
        () = tokio::time::sleep(ttl) => {
            WarmupMetrics::record_expired();
            tracing::info!(%key, "Warmup TTL elapsed; requesting cache-warming response");
            publish(
                bus.as_ref(),
                Event::new(types::WARMUP_RESPONSE_REQUESTED).with_field("key", key),
            );
        }
        _ = cancelled => {}
    }
}

fn tracked_request(state: &State, key: &str) -> Option<WarmupRequestReceived> {
    let entry = state.get(WARMUP_KEY)?.get(key)?.clone();
    serde_json::from_value(entry).ok()
}

#[tracing::instrument(skip(bus, http, tracked))]
async fn warm(
    bus: Arc<dyn EventBus>,
    http: Arc<dyn HttpClient>,
    key: String,
    tracked: Option<WarmupRequestReceived>,
) {
    let outcome = match tracked {
        Some(tracked) => http
            .post(HttpRequest::new(tracked.url, tracked.body))
            .await
            .map(|_| ())
            .map_err(|e| e.to_string()),
        None => Err("no tracked request for key".to_string()),
    };

    let event = match outcome {
        Ok(()) => {
            WarmupMetrics::record_response("fulfilled");
            tracing::info!("Cache-warming request fulfilled");
            Event::new(types::WARMUP_RESPONSE_FULFILLED).with_field("key", key)
        }
        Err(error) => {
            WarmupMetrics::record_response("failed");
            tracing::warn!(%error, "Cache-warming request failed");
            Event::new(types::WARMUP_RESPONSE_FAILED)
                .with_field("key", key)
                .with_field("error", error)
        }
    };
    publish(bus.as_ref(), event);
}

fn publish(bus: &dyn EventBus, event: Event) {
    if let Err(e) = bus.publish(event) {
        tracing::debug!(error = %e, "Warmup driver could not publish");
    }
}
