//! State: a nested JSON mapping whose top-level keys partition ownership.
//!
//! A sub-reducer registered under key `K` only ever sees and returns the slice stored
//! under `K`. The helpers here are the in-memory "database" the composition layer uses to
//! load and store those slices.

use serde_json::{Map, Value};
use std::borrow::Cow;

/// The whole application state (always a JSON object at the top level).
pub type State = Value;

/// An empty slice, used when a key has no state yet.
#[must_use]
pub fn empty() -> State {
    Value::Object(Map::new())
}

/// Borrow the slice under `key`, or an empty object if there is none.
#[must_use]
pub fn slice<'a>(state: &'a State, key: &str) -> Cow<'a, State> {
    state
        .get(key)
        .map_or_else(|| Cow::Owned(empty()), Cow::Borrowed)
}

/// Replace the slice under `key`, turning a non-object state into an object first.
#[must_use]
pub fn store(state: State, key: &str, value: State) -> State {
    let mut map = into_object(state);
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// Delete the slice under `key`.
#[must_use]
pub fn remove(state: State, key: &str) -> State {
    let mut map = into_object(state);
    map.remove(key);
    Value::Object(map)
}

/// Take ownership of the top-level mapping; anything that is not an object becomes empty.
#[must_use]
pub fn into_object(state: State) -> Map<String, Value> {
    match state {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
