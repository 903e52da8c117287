//! Polling driver: turns `HTTP_POLLING_STARTED` into a ticking request loop.
//!
//! Every started poll runs in its own task:
//!
//! - the first request fires immediately, then one per `1000 / rateLimit` ms
//! - a new tick supersedes the request still in flight, so at most one is outstanding
//! - a response whose `data` equals the previous emission is suppressed
//! - a failed request emits `HTTP_POLLING_REQUEST_FAILED` and ends the poll
//!
//! `HTTP_POLLING_STOPPED` stops every poll running at the default interval, plus every poll
//! whose interval equals the stop event's `interval` field. Polls are not stopped by key.

use futures::StreamExt;
use pulse_core::environment::{HttpClient, HttpError, HttpRequest, HttpResponse};
use pulse_core::event::payload::{
    HttpPollingRequestFailed, HttpPollingRequestFulfilled, HttpPollingStarted, HttpPollingStopped,
};
use pulse_core::event::types;
use pulse_core::{Event, EventBus, EventBusError, EventStream};
use pulse_runtime::config::PollingConfig;
use pulse_runtime::metrics::PollingMetrics;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

type PendingResponse<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;

struct ActivePoll {
    key: String,
    interval_ms: u64,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Runs one ticking request loop per `HTTP_POLLING_STARTED` event.
pub struct PollingDriver {
    bus: Arc<dyn EventBus>,
    http: Arc<dyn HttpClient>,
    default_interval_ms: u64,
}

impl PollingDriver {
    /// Create a driver publishing to `bus` and polling through `http`.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>, http: Arc<dyn HttpClient>, config: &PollingConfig) -> Self {
        Self {
            bus,
            http,
            default_interval_ms: config.default_interval_ms,
        }
    }

    /// Subscribe to the bus and run the driver until the bus closes.
    ///
    /// The subscription is taken before this returns, so every event published afterwards is
    /// seen. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] if the bus is already closed.
    pub fn spawn(self) -> Result<JoinHandle<()>, EventBusError> {
        let events = self.bus.subscribe()?;
        Ok(tokio::spawn(self.run(events)))
    }

    async fn run(self, mut events: EventStream) {
        let mut polls: Vec<ActivePoll> = Vec::new();

        while let Some(event) = events.next().await {
            polls.retain(|poll| !poll.task.is_finished());

            match event.event_type() {
                types::HTTP_POLLING_STARTED => {
                    if let Some(poll) = self.start(&event) {
                        polls.push(poll);
                    }
                }
                types::HTTP_POLLING_STOPPED => self.stop(&event, &mut polls),
                _ => {}
            }
        }

        for poll in polls {
            poll.task.abort();
        }
        tracing::debug!("Polling driver finished: event bus closed");
    }

    #[tracing::instrument(skip_all, fields(key = event.str_field("key").unwrap_or_default()))]
    fn start(&self, event: &Event) -> Option<ActivePoll> {
        let started = match event.payload_as::<HttpPollingStarted>() {
            Ok(started) => started,
            Err(e) => {
                let key = event.str_field("key").unwrap_or_default();
                tracing::warn!(error = %e, "Rejected malformed polling request");
                publish_failure(self.bus.as_ref(), key, &e.to_string());
                return None;
            }
        };

        let Some(interval_ms) = started.interval_ms() else {
            tracing::warn!(rate_limit = started.rate_limit, "Rejected non-positive rate limit");
            publish_failure(
                self.bus.as_ref(),
                &started.key,
                &format!("rateLimit must be positive, got {}", started.rate_limit),
            );
            return None;
        };

        let request = HttpRequest::new(started.url.clone(), started.body.clone())
            .with_api_key(started.api_key.clone());
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(poll(
            Arc::clone(&self.bus),
            Arc::clone(&self.http),
            request,
            started.key.clone(),
            Duration::from_millis(interval_ms),
            stopped,
        ));

        tracing::info!(url = %started.url, interval_ms, "Polling started");
        PollingMetrics::record_started();

        Some(ActivePoll {
            key: started.key,
            interval_ms,
            stop,
            task,
        })
    }

    fn stop(&self, event: &Event, polls: &mut Vec<ActivePoll>) {
        let requested = event.payload_as::<HttpPollingStopped>().unwrap_or_default();

        let (stopping, running): (Vec<_>, Vec<_>) = polls.drain(..).partition(|poll| {
            poll.interval_ms == self.default_interval_ms
                || requested.interval == Some(poll.interval_ms)
        });
        *polls = running;

        for poll in stopping {
            tracing::info!(key = %poll.key, interval_ms = poll.interval_ms, "Polling stopped");
            // The receiver is gone if the poll already ended on its own.
            let _ = poll.stop.send(());
            PollingMetrics::record_stopped();
        }
    }
}

async fn poll(
    bus: Arc<dyn EventBus>,
    http: Arc<dyn HttpClient>,
    request: HttpRequest,
    key: String,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut in_flight: Option<PendingResponse<'_>> = None;
    let mut last_emitted: Option<Value> = None;

    loop {
        tokio::select! {
            _ = &mut stopped => break,
            _ = ticker.tick() => {
                if in_flight.is_some() {
                    tracing::debug!(%key, "Superseding in-flight poll request");
                }
                in_flight = Some(http.post(request.clone()));
            }
            result = response(&mut in_flight) => {
                in_flight = None;
                match result {
                    Ok(reply) => {
                        PollingMetrics::record_request("fulfilled");
                        if last_emitted.as_ref() == Some(&reply.data) {
                            PollingMetrics::record_deduplicated();
                            continue;
                        }
                        last_emitted = Some(reply.data.clone());
                        if publish_fulfilled(bus.as_ref(), &key, reply).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        PollingMetrics::record_request("failed");
                        tracing::warn!(%key, error = %e, "Poll request failed; ending poll");
                        publish_failure(bus.as_ref(), &key, &e.to_string());
                        break;
                    }
                }
            }
        }
    }
}

/// Resolves with the in-flight response, or never if nothing is in flight.
async fn response(in_flight: &mut Option<PendingResponse<'_>>) -> Result<HttpResponse, HttpError> {
    match in_flight.as_mut() {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

fn publish_fulfilled(
    bus: &dyn EventBus,
    key: &str,
    response: HttpResponse,
) -> Result<(), EventBusError> {
    let payload = HttpPollingRequestFulfilled {
        status: response.status,
        data: response.data,
        key: key.to_string(),
    };
    match Event::with_payload(types::HTTP_POLLING_REQUEST_FULFILLED, &payload) {
        Ok(event) => bus.publish(event),
        Err(e) => {
            tracing::error!(%key, error = %e, "Failed to encode poll response");
            Ok(())
        }
    }
}

fn publish_failure(bus: &dyn EventBus, key: &str, error: &str) {
    let payload = HttpPollingRequestFailed {
        key: key.to_string(),
        error: error.to_string(),
    };
    let published = Event::with_payload(types::HTTP_POLLING_REQUEST_FAILED, &payload)
        .map_err(|e| e.to_string())
        .and_then(|event| bus.publish(event).map_err(|e| e.to_string()));
    if let Err(e) = published {
        tracing::debug!(%key, error = %e, "Could not report poll failure");
    }
}
