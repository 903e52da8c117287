//! Cross-source ETH/USD average.
//!
//! The slice is `{ "prices": { source: price }, "mean": number }`. Prices are taken from the
//! same fulfilled polls the per-source modules consume, so this module never reads another
//! module's slice.

use crate::eth_usd;
use pulse_core::event::types;
use pulse_core::trigger::NoTrigger;
use pulse_core::{Event, Module, State};
use pulse_runtime::Runtime;
use serde_json::{Map, Value, json};

/// State key of the average.
pub const STATE_KEY: &str = "ccc-eth-usd";

/// Arithmetic mean of every numeric price, `None` if there are none.
#[must_use]
pub fn mean(prices: &Map<String, Value>) -> Option<f64> {
    let known: Vec<f64> = prices.values().filter_map(Value::as_f64).collect();
    if known.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = known.len() as f64;
    Some(known.iter().sum::<f64>() / count)
}

/// Fold one event into the average slice.
fn reduce(sources: &[String], state: State, event: &Event) -> State {
    if !event.is(types::HTTP_POLLING_REQUEST_FULFILLED) {
        return state;
    }
    let Some((source, price)) = sources
        .iter()
        .find_map(|source| eth_usd::price_for(event, source).map(|price| (source, price)))
    else {
        return state;
    };

    let mut prices = state
        .get("prices")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    prices.insert(source.clone(), price);

    match mean(&prices) {
        Some(mean) => json!({ "prices": prices, "mean": mean }),
        None => json!({ "prices": prices }),
    }
}

/// The average module over `sources`.
#[must_use]
pub fn module(sources: &[String]) -> Module {
    let sources = sources.to_vec();
    Module::new(
        move |state: State, event: &Event| reduce(&sources, state, event),
        NoTrigger,
    )
}

/// Register the average module on `runtime`.
pub fn install(runtime: &Runtime, sources: &[String]) {
    runtime.register(STATE_KEY, module(sources));
    tracing::info!(?sources, "Installed cross-source ETH/USD average");
}
