//! Reducer and trigger composition
//!
//! - **[`combine_reducers`]**: fold each key's slice through its own reducer
//! - **[`combine_triggers`]**: run each key's trigger on its own slice and merge the outputs
//!
//! Both take a key → handler map and return a single composed value. The composed value is
//! rebuilt whenever the map changes; it is never mutated in place.
//!
//! # Examples
//!
//! ```
//! use pulse_core::composition::{combine_reducers, ReducerMap};
//! use pulse_core::event::Event;
//! use pulse_core::reducer::Reducer;
//! use pulse_core::state::State;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let counter = |s: State, e: &Event| {
//!     if e.is("tick") {
//!         json!(s.as_u64().unwrap_or(0) + 1)
//!     } else {
//!         s
//!     }
//! };
//!
//! let mut reducers = ReducerMap::new();
//! reducers.insert("ticks".to_string(), Arc::new(counter));
//! let combined = combine_reducers(reducers);
//!
//! let state = combined.reduce(json!({ "other": true }), &Event::new("tick"));
//! assert_eq!(state, json!({ "other": true, "ticks": 1 }));
//! ```

use crate::event::Event;
use crate::reducer::Reducer;
use crate::state::{self, State};
use crate::trigger::{Trigger, Triggered};
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key → sub-reducer mapping.
pub type ReducerMap = BTreeMap<String, Arc<dyn Reducer>>;

/// Key → sub-trigger mapping.
pub type TriggerMap = BTreeMap<String, Arc<dyn Trigger>>;

/// Compose per-key sub-reducers into one reducer over the whole state.
///
/// For every key `k`: `state[k] = reducers[k](state[k] ?? {}, event)`. Keys that are not in
/// the map are left untouched.
#[must_use]
pub fn combine_reducers(reducers: ReducerMap) -> CombinedReducer {
    CombinedReducer {
        reducers: Arc::new(reducers),
    }
}

/// A reducer that updates each key's slice independently.
///
/// Created by [`combine_reducers`].
#[derive(Clone, Default)]
pub struct CombinedReducer {
    reducers: Arc<ReducerMap>,
}

impl CombinedReducer {
    /// Keys owned by this reducer, in application order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.reducers.keys().map(String::as_str)
    }
}

impl Reducer for CombinedReducer {
    fn reduce(&self, state: State, event: &Event) -> State {
        let mut map = state::into_object(state);

        for (key, reducer) in self.reducers.iter() {
            let current = map.remove(key).unwrap_or_else(state::empty);
            map.insert(key.clone(), reducer.reduce(current, event));
        }

        Value::Object(map)
    }
}

/// Compose per-key sub-triggers into one trigger over the whole state.
#[must_use]
pub fn combine_triggers(triggers: TriggerMap) -> CombinedTriggers {
    CombinedTriggers {
        triggers: Arc::new(triggers),
    }
}

/// Runs every key's trigger against that key's slice.
///
/// Created by [`combine_triggers`].
#[derive(Clone, Default)]
pub struct CombinedTriggers {
    triggers: Arc<TriggerMap>,
}

impl CombinedTriggers {
    /// Invoke every trigger and merge their outputs into one stream.
    ///
    /// Each key's events keep their relative order; there is no ordering between keys.
    #[must_use]
    pub fn fire(&self, state: &State, event: &Event) -> BoxStream<'static, Event> {
        let outputs = self
            .triggers
            .iter()
            .map(|(key, trigger)| stream::iter(trigger.trigger(&state::slice(state, key), event)));

        stream::select_all(outputs).boxed()
    }

    /// Keys owned by these triggers.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.triggers.keys().map(String::as_str)
    }
}

impl Trigger for CombinedTriggers {
    fn trigger(&self, state: &State, event: &Event) -> Triggered {
        self.triggers
            .iter()
            .flat_map(|(key, trigger)| trigger.trigger(&state::slice(state, key), event))
            .collect()
    }
}
