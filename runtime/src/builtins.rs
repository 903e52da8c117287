//! Built-in state slices owned by the runtime itself.
//!
//! The root state has three top-level keys:
//!
//! - `runtime`: lifecycle status and restart counter
//! - `modules`: every registered module's slice, folded by the reducer registry
//! - `warmup`: warmup tracking entries keyed by `(url, body)` hash

use pulse_core::event::payload::{WarmupKey, WarmupRequestReceived};
use pulse_core::event::types;
use pulse_core::state::{self, State};
use pulse_core::{Event, ReducerRegistry};
use serde_json::{Value, json};

/// Slice holding runtime lifecycle status.
pub const RUNTIME_KEY: &str = "runtime";
/// Slice holding every registered module's state.
pub const MODULES_KEY: &str = "modules";
/// Slice holding warmup tracking entries.
pub const WARMUP_KEY: &str = "warmup";

/// The state every runtime starts from.
#[must_use]
pub fn initial_state() -> State {
    json!({
        RUNTIME_KEY: { "status": "stopped" },
        MODULES_KEY: {},
        WARMUP_KEY: {},
    })
}

/// `start` marks the runtime started; `restart` bumps a counter and leaves everything else.
#[must_use]
pub fn runtime_reducer(state: State, event: &Event) -> State {
    match event.event_type() {
        types::START => state::store(state, "status", json!("started")),
        types::RESTART => {
            let restarted = state.get("restarted").and_then(Value::as_u64).unwrap_or(0);
            state::store(state, "restarted", json!(restarted + 1))
        }
        _ => state,
    }
}

/// Set on a warmup entry while its cache-warming request is outstanding.
pub const IN_FLIGHT_FIELD: &str = "inFlight";

/// Tracks the last known `{url, body, ttl, meta}` per warmup key.
///
/// Entries are created or refreshed by `WARMUP_REQUEST_RECIEVED`, which also clears the
/// in-flight mark. `WARMUP_RESPONSE_REQUESTED` marks the entry in flight, and a fulfilled or
/// failed response destroys it only while that mark is still set. A registration refreshed
/// during an outstanding request therefore survives the stale response.
#[must_use]
pub fn warmup_reducer(state: State, event: &Event) -> State {
    match event.event_type() {
        types::WARMUP_REQUEST_RECIEVED => match event.payload_as::<WarmupRequestReceived>() {
            Ok(request) => {
                let key = request.hash_key();
                let entry = json!({
                    "url": request.url,
                    "body": request.body,
                    "ttl": request.ttl,
                    "meta": request.meta,
                });
                state::store(state, &key, entry)
            }
            // The warmup driver reports malformed registrations; nothing to track here.
            Err(_) => state,
        },
        types::WARMUP_RESPONSE_REQUESTED => match event.payload_as::<WarmupKey>() {
            Ok(WarmupKey { key }) => {
                let Some(entry) = state.get(&key).cloned() else {
                    return state;
                };
                let entry = state::store(entry, IN_FLIGHT_FIELD, json!(true));
                state::store(state, &key, entry)
            }
            Err(_) => state,
        },
        types::WARMUP_RESPONSE_FULFILLED | types::WARMUP_RESPONSE_FAILED => {
            match event.payload_as::<WarmupKey>() {
                Ok(WarmupKey { key }) if is_in_flight(&state, &key) => state::remove(state, &key),
                _ => state,
            }
        }
        _ => state,
    }
}

fn is_in_flight(state: &State, key: &str) -> bool {
    state
        .get(key)
        .and_then(|entry| entry.get(IN_FLIGHT_FIELD))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Fold one event into the root state.
pub(crate) fn reduce_root(state: State, event: &Event, modules: &mut ReducerRegistry) -> State {
    let mut root = state::into_object(state);

    let runtime = root.remove(RUNTIME_KEY).unwrap_or_else(state::empty);
    root.insert(RUNTIME_KEY.to_string(), runtime_reducer(runtime, event));

    let module_state = root.remove(MODULES_KEY).unwrap_or_else(state::empty);
    root.insert(MODULES_KEY.to_string(), modules.fold(module_state, event));

    let warmup = root.remove(WARMUP_KEY).unwrap_or_else(state::empty);
    root.insert(WARMUP_KEY.to_string(), warmup_reducer(warmup, event));

    Value::Object(root)
}
