//! Runtime-mutable registries of reducers and triggers.
//!
//! A [`Registry`] keeps an explicit key → handler mapping and rebuilds a single composed
//! handler on every add or remove. Changes are expressed as a closed set of operations
//! ([`RegistryOp`]) so every mutation goes through one place.
//!
//! Reducer removal is two-phase: removing a key drops its reducer immediately and queues the
//! key; the next [`fold`](ReducerRegistry::fold) deletes the queued keys from state before the
//! new combined reducer runs. A removed reducer is therefore never asked to process a slice it
//! no longer owns, and the slice is purged rather than orphaned.
//!
//! # Example
//!
//! ```
//! use pulse_core::{Event, ReducerRegistry, State};
//! use pulse_core::reducer::Reducer;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut registry = ReducerRegistry::new();
//! registry.add("seen", Arc::new(|_s: State, _e: &Event| json!(true)));
//!
//! let state = registry.fold(json!({}), &Event::start());
//! assert_eq!(state, json!({ "seen": true }));
//!
//! registry.remove("seen");
//! let state = registry.fold(state, &Event::start());
//! assert_eq!(state, json!({}));
//! ```

use crate::composition::{CombinedReducer, CombinedTriggers, combine_reducers, combine_triggers};
use crate::event::Event;
use crate::reducer::Reducer;
use crate::state::{self, State};
use crate::trigger::Trigger;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A mutation applied to a registry.
pub enum RegistryOp<H> {
    /// Insert a handler; ignored if the key is empty or already present
    Add {
        /// Registration key
        key: String,
        /// Handler to register
        handler: H,
    },
    /// Drop a handler; ignored if the key is absent
    Remove {
        /// Registration key
        key: String,
    },
}

/// What a [`RegistryOp`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOutcome {
    /// The handler was inserted
    Added,
    /// The handler was removed
    Removed,
    /// Nothing changed (duplicate add, empty key, unknown remove)
    Ignored,
}

/// Handlers that can be composed into a single combined handler.
pub trait Compose: Clone {
    /// The composed handler type.
    type Combined: Clone + Default;

    /// Whether removed keys must be purged from state on the next fold.
    const DEFERS_CLEANUP: bool;

    /// Build the composed handler from the current mapping.
    fn compose(handlers: &BTreeMap<String, Self>) -> Self::Combined;
}

impl Compose for Arc<dyn Reducer> {
    type Combined = CombinedReducer;
    const DEFERS_CLEANUP: bool = true;

    fn compose(handlers: &BTreeMap<String, Self>) -> Self::Combined {
        combine_reducers(handlers.clone())
    }
}

impl Compose for Arc<dyn Trigger> {
    type Combined = CombinedTriggers;
    const DEFERS_CLEANUP: bool = false;

    fn compose(handlers: &BTreeMap<String, Self>) -> Self::Combined {
        combine_triggers(handlers.clone())
    }
}

/// Key → handler mapping plus the composed handler `C` built from it.
///
/// `C` is always `H::Combined`; see [`ReducerRegistry`] and [`TriggerRegistry`].
pub struct Registry<H, C> {
    handlers: BTreeMap<String, H>,
    combined: C,
    pending_removal: Vec<String>,
}

/// Registry of module reducers.
pub type ReducerRegistry = Registry<Arc<dyn Reducer>, CombinedReducer>;

/// Registry of module triggers.
pub type TriggerRegistry = Registry<Arc<dyn Trigger>, CombinedTriggers>;

impl<H, C: Default> Default for Registry<H, C> {
    fn default() -> Self {
        Self {
            handlers: BTreeMap::new(),
            combined: C::default(),
            pending_removal: Vec::new(),
        }
    }
}

impl<H, C> Registry<H, C>
where
    H: Compose<Combined = C>,
    C: Clone + Default,
{
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single mutation.
    pub fn apply(&mut self, op: RegistryOp<H>) -> RegistryOutcome {
        match op {
            RegistryOp::Add { key, handler } => {
                if key.is_empty() || self.handlers.contains_key(&key) {
                    return RegistryOutcome::Ignored;
                }
                self.handlers.insert(key, handler);
            }
            RegistryOp::Remove { key } => {
                if self.handlers.remove(&key).is_none() {
                    return RegistryOutcome::Ignored;
                }
                if H::DEFERS_CLEANUP {
                    self.pending_removal.push(key);
                }
                self.combined = H::compose(&self.handlers);
                return RegistryOutcome::Removed;
            }
        }

        self.combined = H::compose(&self.handlers);
        RegistryOutcome::Added
    }

    /// Register `handler` under `key`.
    pub fn add(&mut self, key: impl Into<String>, handler: H) -> RegistryOutcome {
        self.apply(RegistryOp::Add {
            key: key.into(),
            handler,
        })
    }

    /// Unregister `key`.
    pub fn remove(&mut self, key: impl Into<String>) -> RegistryOutcome {
        self.apply(RegistryOp::Remove { key: key.into() })
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.handlers.contains_key(key)
    }

    /// Registered keys in composition order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// The composed handler as of the last mutation.
    #[must_use]
    pub fn combined(&self) -> C {
        self.combined.clone()
    }

    /// Keys waiting to be purged from state on the next fold.
    #[must_use]
    pub fn pending_removals(&self) -> &[String] {
        &self.pending_removal
    }
}

impl ReducerRegistry {
    /// Fold one event into the state this registry owns.
    ///
    /// Queued removals are deleted from `state` first (exactly once), then the current
    /// combined reducer runs.
    pub fn fold(&mut self, state: State, event: &Event) -> State {
        let state = self
            .pending_removal
            .drain(..)
            .fold(state, |acc, key| state::remove(acc, &key));

        self.combined.reduce(state, event)
    }
}
