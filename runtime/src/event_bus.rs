//! In-process replay-latest event bus built on `tokio::sync::broadcast`.

use crate::metrics::BusMetrics;
use futures::StreamExt;
use pulse_core::{Event, EventBus, EventBusError, EventStream};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast::{self, error::RecvError};

/// Default number of events buffered per subscriber.
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

struct BusInner {
    sender: Option<broadcast::Sender<Event>>,
    latest: Option<Event>,
}

/// Multicast bus that replays the latest event to new subscribers.
///
/// Publishing and subscribing take the same lock, so a subscriber either sees an event as
/// its replay or as a live delivery, never both and never neither.
///
/// A subscriber that falls more than `capacity` events behind skips the oldest ones; the gap
/// is logged and counted in `event_bus_lagged_total`.
pub struct BroadcastEventBus {
    inner: Mutex<BusInner>,
}

impl BroadcastEventBus {
    /// Create an open bus with the given per-subscriber buffer.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Mutex::new(BusInner {
                sender: Some(sender),
                latest: None,
            }),
        }
    }

    /// The most recently published event.
    #[must_use]
    pub fn latest(&self) -> Option<Event> {
        self.lock().latest.clone()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: Event) -> Result<(), EventBusError> {
        let mut inner = self.lock();
        let Some(sender) = inner.sender.clone() else {
            BusMetrics::record_publish_error();
            return Err(EventBusError::Closed);
        };

        tracing::trace!(event_type = event.event_type(), "Publishing event");
        inner.latest = Some(event.clone());
        // No receivers is fine: the event is still kept for replay.
        let _ = sender.send(event);
        BusMetrics::record_publish();
        Ok(())
    }

    fn subscribe(&self) -> Result<EventStream, EventBusError> {
        let (mut receiver, replay) = {
            let inner = self.lock();
            let Some(sender) = inner.sender.as_ref() else {
                return Err(EventBusError::SubscriptionFailed(
                    "event bus is closed".to_string(),
                ));
            };
            (sender.subscribe(), inner.latest.clone())
        };

        let stream = async_stream::stream! {
            if let Some(event) = replay {
                yield event;
            }
            loop {
                match receiver.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Subscriber lagged behind the event bus");
                        BusMetrics::record_lagged(skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        };

        Ok(stream.boxed())
    }

    fn close(&self) {
        if self.lock().sender.take().is_some() {
            tracing::info!("Event bus closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().sender.is_none()
    }
}
