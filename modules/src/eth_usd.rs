//! Per-source ETH/USD price.
//!
//! For each source the module registers two handlers under different keys:
//!
//! - trigger `"{source}"`: answers `start` with `HTTP_POLLING_STARTED` for the source's
//!   adapter, correlated by `key = source`
//! - reducer `"{source}-eth-usd"`: keeps `data.data.result` from fulfilled polls of that key

use pulse_core::event::types;
use pulse_core::reducer::Reducer;
use pulse_core::trigger::{Trigger, Triggered};
use pulse_core::{Event, State, smallvec};
use pulse_runtime::Runtime;
use serde_json::{Value, json};
use std::sync::Arc;

/// Requests per second made against each adapter.
pub const RATE_LIMIT: f64 = 0.2;

/// State key of a source's price.
#[must_use]
pub fn state_key(source: &str) -> String {
    format!("{source}-eth-usd")
}

/// Adapter endpoint for a source.
#[must_use]
pub fn adapter_url(base_url: &str, source: &str) -> String {
    format!("{}/{source}/call", base_url.trim_end_matches('/'))
}

/// The adapter request body.
#[must_use]
pub fn request_body() -> Value {
    json!({ "data": { "base": "ETH", "quote": "USD" } })
}

/// The price carried by a fulfilled poll of `source`, if any.
#[must_use]
pub fn price_for(event: &Event, source: &str) -> Option<Value> {
    if !event.is(types::HTTP_POLLING_REQUEST_FULFILLED) || event.str_field("key") != Some(source) {
        return None;
    }
    event
        .field("data")
        .and_then(|data| data.get("data"))
        .and_then(|data| data.get("result"))
        .filter(|result| !result.is_null())
        .cloned()
}

/// Reducer keeping the latest price for `source`; anything else leaves the slice alone.
pub fn reducer(source: &str) -> impl Reducer + 'static {
    let source = source.to_string();
    move |state: State, event: &Event| price_for(event, &source).unwrap_or(state)
}

/// Trigger starting the source's poll when the runtime starts.
pub fn trigger(base_url: &str, source: &str) -> impl Trigger + 'static {
    let started = Event::new(types::HTTP_POLLING_STARTED)
        .with_field("rateLimit", RATE_LIMIT)
        .with_field("url", adapter_url(base_url, source))
        .with_field("body", request_body())
        .with_field("apiKey", "")
        .with_field("key", source);

    move |_state: &State, event: &Event| -> Triggered {
        if event.is(types::START) {
            smallvec![started.clone()]
        } else {
            smallvec![]
        }
    }
}

/// Register the price module for `source` on `runtime`.
pub fn install(runtime: &Runtime, base_url: &str, source: &str) {
    runtime.register_reducer(&state_key(source), Arc::new(reducer(source)));
    runtime.register_trigger(source, Arc::new(trigger(base_url, source)));
    tracing::info!(source, url = %adapter_url(base_url, source), "Installed ETH/USD source");
}
