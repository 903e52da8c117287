//! Polling driver behaviour under a paused clock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use pulse_core::environment::HttpError;
use pulse_core::event::types;
use pulse_core::{Event, EventBus};
use pulse_drivers::PollingDriver;
use pulse_runtime::BroadcastEventBus;
use pulse_runtime::config::PollingConfig;
use pulse_testing::{EventRecorder, MockHttpClient};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Test Fixtures
// ============================================================================

const WAIT: Duration = Duration::from_secs(60);

struct Harness {
    bus: Arc<BroadcastEventBus>,
    http: Arc<MockHttpClient>,
    recorder: EventRecorder,
}

fn harness() -> Harness {
    let bus = Arc::new(BroadcastEventBus::default());
    let http = Arc::new(MockHttpClient::new());
    let recorder = EventRecorder::attach(bus.as_ref()).unwrap();

    PollingDriver::new(bus.clone(), http.clone(), &PollingConfig::default())
        .spawn()
        .unwrap();

    Harness {
        bus,
        http,
        recorder,
    }
}

fn started(rate_limit: f64, key: &str) -> Event {
    Event::new(types::HTTP_POLLING_STARTED)
        .with_field("rateLimit", rate_limit)
        .with_field("url", "http://adapter/coingecko/call")
        .with_field("body", json!({ "data": { "base": "ETH", "quote": "USD" } }))
        .with_field("apiKey", "secret")
        .with_field("key", key)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_first_request_fires_immediately_with_configured_request() {
    let h = harness();
    h.http.always_respond_with(json!({ "data": { "result": 2000 } }));

    h.bus.publish(started(1.0, "coingecko")).unwrap();
    settle().await;

    assert_eq!(h.http.request_count(), 1);
    let request = &h.http.requests()[0];
    assert_eq!(request.url, "http://adapter/coingecko/call");
    assert_eq!(request.body["data"]["base"], json!("ETH"));
    assert_eq!(request.api_key.as_deref(), Some("secret"));

    let fulfilled = h
        .recorder
        .wait_for(types::HTTP_POLLING_REQUEST_FULFILLED, 1)
        .await;
    assert_eq!(fulfilled[0].str_field("key"), Some("coingecko"));
    assert_eq!(fulfilled[0].field("status"), Some(&json!(200)));
    assert_eq!(
        fulfilled[0].field("data").unwrap()["data"]["result"],
        json!(2000)
    );
}

#[tokio::test(start_paused = true)]
async fn test_requests_repeat_at_rate_limit_interval() {
    let h = harness();
    h.http.always_respond_with(json!(1));

    // 0.5 requests/sec → every 2000 ms: t = 0, 2000, 4000, 6000
    h.bus.publish(started(0.5, "k")).unwrap();
    tokio::time::sleep(Duration::from_millis(6500)).await;

    assert_eq!(h.http.request_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_identical_consecutive_responses_are_suppressed() {
    let h = harness();
    h.http.respond_with(json!({ "price": 1 }));
    h.http.respond_with(json!({ "price": 1 }));
    h.http.respond_with(json!({ "price": 2 }));
    h.http.always_respond_with(json!({ "price": 2 }));

    h.bus.publish(started(1.0, "k")).unwrap();

    let fulfilled = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::HTTP_POLLING_REQUEST_FULFILLED, 2),
    )
    .await
    .unwrap();
    assert_eq!(fulfilled[0].field("data"), Some(&json!({ "price": 1 })));
    assert_eq!(fulfilled[1].field("data"), Some(&json!({ "price": 2 })));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.http.request_count() >= 6);
    assert_eq!(h.recorder.count(types::HTTP_POLLING_REQUEST_FULFILLED), 2);
}

#[tokio::test(start_paused = true)]
async fn test_new_tick_supersedes_in_flight_request() {
    let h = harness();
    h.http.always_respond_with(json!(1));
    h.http.set_delay(Duration::from_millis(1500));

    // Every response takes longer than the 1000 ms interval, so none ever lands.
    h.bus.publish(started(1.0, "slow")).unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(h.http.request_count() >= 10);
    assert_eq!(h.recorder.count(types::HTTP_POLLING_REQUEST_FULFILLED), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_request_emits_failure_and_ends_poll() {
    let h = harness();
    h.http.fail_with(HttpError::Status {
        url: "http://adapter/coingecko/call".to_string(),
        status: 500,
    });
    h.http.always_respond_with(json!(1));

    h.bus.publish(started(1.0, "coingecko")).unwrap();
    let failed = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::HTTP_POLLING_REQUEST_FAILED, 1),
    )
    .await
    .unwrap();
    assert_eq!(failed[0].str_field("key"), Some("coingecko"));
    assert!(failed[0].str_field("error").unwrap().contains("500"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.http.request_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_positive_rate_limit_is_rejected() {
    let h = harness();
    h.http.always_respond_with(json!(1));

    h.bus.publish(started(0.0, "broken")).unwrap();
    let failed = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::HTTP_POLLING_REQUEST_FAILED, 1),
    )
    .await
    .unwrap();

    assert_eq!(failed[0].str_field("key"), Some("broken"));
    assert_eq!(h.http.request_count(), 0);
}

// ============================================================================
// Stop matching
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_stop_halts_every_default_interval_poll() {
    let h = harness();
    h.http.always_respond_with(json!(1));

    h.bus.publish(started(1.0, "a")).unwrap();
    h.bus.publish(started(1.0, "b")).unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(h.http.request_count(), 6);

    h.bus.publish(Event::new(types::HTTP_POLLING_STOPPED)).unwrap();
    settle().await;
    let stopped_at = h.http.request_count();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.http.request_count(), stopped_at);
}

#[tokio::test(start_paused = true)]
async fn test_non_default_poll_only_stops_on_matching_interval() {
    let h = harness();
    h.http.always_respond_with(json!(1));

    // 0.2 requests/sec → 5000 ms, not the 1000 ms default.
    h.bus.publish(started(0.2, "slow")).unwrap();
    settle().await;

    h.bus.publish(Event::new(types::HTTP_POLLING_STOPPED)).unwrap();
    h.bus
        .publish(Event::new(types::HTTP_POLLING_STOPPED).with_field("interval", 2000))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(h.http.request_count(), 3);

    h.bus
        .publish(Event::new(types::HTTP_POLLING_STOPPED).with_field("interval", 5000))
        .unwrap();
    settle().await;
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(h.http.request_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_polls_end_when_bus_closes() {
    let h = harness();
    h.http.always_respond_with(json!(1));

    h.bus.publish(started(1.0, "k")).unwrap();
    settle().await;
    h.bus.close();
    settle().await;

    let closed_at = h.http.request_count();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.http.request_count(), closed_at);
}
