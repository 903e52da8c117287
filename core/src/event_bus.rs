//! Event bus abstraction.
//!
//! The bus is the only shared mutable resource in the system. Writers only ever append
//! (publish); readers subscribe and receive a replay of the most recently published event
//! followed by every later event in publish order.
//!
//! # Architecture
//!
//! ```text
//!          ┌──────────────┐
//!   ┌─────►│  Event Bus   │◄──────────────┐
//!   │      └──────┬───────┘               │
//!   │             │ subscribe             │ publish
//!   │      ┌──────┴────────┬──────────┐   │
//!   │      ▼               ▼          ▼   │
//!   │  ┌────────┐    ┌──────────┐  ┌──────┴──┐
//!   │  │  Fold  │    │ Feedback │  │ Drivers │
//!   │  └───┬────┘    └────┬─────┘  └─────────┘
//!   │      ▼              │
//!   │   State ───────────►│ triggers
//!   └─────────────────────┘
//! ```
//!
//! # Key Principles
//!
//! - **Replay-latest**: a new subscriber immediately sees the last published event
//! - **Publish order**: each subscriber observes events in the order they were published
//! - **Independent subscribers**: no subscriber waits for another
//! - **Explicit lifecycle**: constructed once at startup, closed at shutdown; closing ends
//!   every subscription
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//! use pulse_core::{Event, EventBus};
//!
//! async fn example(bus: &impl EventBus) -> Result<(), pulse_core::EventBusError> {
//!     bus.publish(Event::start())?;
//!
//!     let mut events = bus.subscribe()?;
//!     while let Some(event) = events.next().await {
//!         tracing::debug!(event_type = event.event_type(), "Received event");
//!     }
//!     Ok(())
//! }
//! ```

use crate::event::Event;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The bus was closed; nothing more can be published
    #[error("Event bus is closed")]
    Closed,

    /// A subscription could not be created
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),
}

/// Stream of events from a subscription.
///
/// Ends when the bus is closed.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// Trait for event bus implementations.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the bus is shared by the runtime loop and every
/// driver behind an `Arc`.
pub trait EventBus: Send + Sync {
    /// Publish an event to every current subscriber and remember it as the latest.
    ///
    /// Publishing with no subscribers is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::Closed`] after [`close`](EventBus::close).
    fn publish(&self, event: Event) -> Result<(), EventBusError>;

    /// Subscribe to the bus.
    ///
    /// The stream starts with the most recently published event (if any), then yields all
    /// later events in publish order.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] after [`close`](EventBus::close).
    fn subscribe(&self) -> Result<EventStream, EventBusError>;

    /// Close the bus. Every subscription completes once it has drained.
    fn close(&self);

    /// Whether [`close`](EventBus::close) has been called.
    fn is_closed(&self) -> bool;
}
