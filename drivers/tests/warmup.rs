//! Warmup driver behaviour under a paused clock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use pulse_core::environment::HttpError;
use pulse_core::event::types;
use pulse_core::{Event, EventBus};
use pulse_drivers::WarmupDriver;
use pulse_runtime::builtins::WARMUP_KEY;
use pulse_runtime::{BroadcastEventBus, Runtime};
use pulse_testing::{EventRecorder, MockHttpClient};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

// ============================================================================
// Test Fixtures
// ============================================================================

const WAIT: Duration = Duration::from_secs(60);
const EA: &str = "http://ea:8080";

struct Harness {
    bus: Arc<BroadcastEventBus>,
    http: Arc<MockHttpClient>,
    recorder: EventRecorder,
    runtime: Runtime,
}

fn harness() -> Harness {
    let bus = Arc::new(BroadcastEventBus::default());
    let http = Arc::new(MockHttpClient::new());
    http.always_respond_with(json!({ "ok": true }));

    let recorder = EventRecorder::attach(bus.as_ref()).unwrap();
    let runtime = Runtime::new(bus.clone());
    runtime.start().unwrap();

    WarmupDriver::new(bus.clone(), http.clone(), runtime.state_handle())
        .spawn()
        .unwrap();

    Harness {
        bus,
        http,
        recorder,
        runtime,
    }
}

fn received(body: Value, ttl: u64) -> Event {
    Event::new(types::WARMUP_REQUEST_RECIEVED)
        .with_field("url", EA)
        .with_field("body", body)
        .with_field("ttl", ttl)
        .with_field("meta", json!({ "source": "test" }))
}

fn key_of(body: &Value) -> String {
    format!("{EA}{body}")
}

// ============================================================================
// Countdown
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_countdown_fires_once_after_ttl() {
    let h = harness();
    let body = json!({ "data": { "from": "ETH" } });

    let armed_at = Instant::now();
    h.bus.publish(received(body.clone(), 100)).unwrap();

    let requested = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_REQUESTED, 1),
    )
    .await
    .unwrap();
    assert!(armed_at.elapsed() >= Duration::from_millis(100));
    assert_eq!(requested[0].str_field("key"), Some(key_of(&body).as_str()));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_REQUESTED), 1);
    assert_eq!(h.recorder.count(types::WARMUP_REQUEST_FULFILLED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_same_request_within_ttl_restarts_countdown() {
    let h = harness();
    let body = json!({ "id": 1 });

    let armed_at = Instant::now();
    h.bus.publish(received(body.clone(), 100)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.bus.publish(received(body.clone(), 100)).unwrap();

    // Past the first arming's deadline: nothing fired.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_REQUESTED), 0);

    tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_REQUESTED, 1),
    )
    .await
    .unwrap();
    assert!(armed_at.elapsed() >= Duration::from_millis(150));

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_REQUESTED), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_bodies_are_tracked_independently() {
    let h = harness();

    h.bus.publish(received(json!({ "id": 1 }), 100)).unwrap();
    h.bus.publish(received(json!({ "id": 2 }), 100)).unwrap();

    let requested = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_REQUESTED, 2),
    )
    .await
    .unwrap();

    let mut keys: Vec<&str> = requested.iter().filter_map(|e| e.str_field("key")).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![r#"http://ea:8080{"id":1}"#, r#"http://ea:8080{"id":2}"#]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_request_fails_without_arming() {
    let h = harness();

    h.bus.publish(Event::new(types::WARMUP_REQUEST_RECIEVED)).unwrap();

    tokio::time::timeout(WAIT, h.recorder.wait_for(types::WARMUP_REQUEST_FAILED, 1))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_REQUESTED), 0);
}

// ============================================================================
// Response firing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_elapsed_countdown_posts_tracked_request() {
    let h = harness();
    let body = json!({ "data": { "from": "ETH", "to": "USD" } });

    h.bus.publish(received(body.clone(), 100)).unwrap();

    let fulfilled = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FULFILLED, 1),
    )
    .await
    .unwrap();
    assert_eq!(fulfilled[0].str_field("key"), Some(key_of(&body).as_str()));

    let requests = h.http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, EA);
    assert_eq!(requests[0].body, body);

    // The tracking entry is dropped once the response settles.
    let state = tokio::time::timeout(
        WAIT,
        h.runtime
            .state_handle()
            .wait_for(|s| s[WARMUP_KEY].as_object().is_some_and(serde_json::Map::is_empty)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state[WARMUP_KEY], json!({}));
}

#[tokio::test(start_paused = true)]
async fn test_failed_warming_request_emits_failure() {
    let h = harness();
    h.http.fail_with(HttpError::Timeout {
        url: EA.to_string(),
    });
    let body = json!({ "id": 9 });

    h.bus.publish(received(body.clone(), 100)).unwrap();

    let failed = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FAILED, 1),
    )
    .await
    .unwrap();
    assert_eq!(failed[0].str_field("key"), Some(key_of(&body).as_str()));
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_FULFILLED), 0);
}

#[tokio::test(start_paused = true)]
async fn test_response_for_untracked_key_fails() {
    let h = harness();

    h.bus
        .publish(Event::new(types::WARMUP_RESPONSE_REQUESTED).with_field("key", "nope"))
        .unwrap();

    let failed = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FAILED, 1),
    )
    .await
    .unwrap();
    assert_eq!(failed[0].str_field("key"), Some("nope"));
    assert_eq!(h.http.request_count(), 0);
}

// ============================================================================
// Re-registration
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_reregistering_during_outstanding_request_warms_again() {
    let h = harness();
    h.http.set_delay(Duration::from_millis(50));
    let body = json!({ "id": 3 });

    h.bus.publish(received(body.clone(), 100)).unwrap();
    tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_REQUESTED, 1),
    )
    .await
    .unwrap();

    // The first cache-warming request is still outstanding until t=150.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_FULFILLED), 0);
    h.bus.publish(received(body.clone(), 100)).unwrap();

    let fulfilled = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FULFILLED, 2),
    )
    .await
    .unwrap();
    assert_eq!(fulfilled.len(), 2);
    assert_eq!(h.http.request_count(), 2);
    assert_eq!(h.recorder.count(types::WARMUP_RESPONSE_FAILED), 0);

    let state = tokio::time::timeout(
        WAIT,
        h.runtime
            .state_handle()
            .wait_for(|s| s[WARMUP_KEY].as_object().is_some_and(serde_json::Map::is_empty)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(state[WARMUP_KEY], json!({}));
}

#[tokio::test(start_paused = true)]
async fn test_reregistering_after_fulfilment_warms_again() {
    let h = harness();
    let body = json!({ "id": 4 });

    h.bus.publish(received(body.clone(), 100)).unwrap();
    tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FULFILLED, 1),
    )
    .await
    .unwrap();
    tokio::time::timeout(
        WAIT,
        h.runtime
            .state_handle()
            .wait_for(|s| s[WARMUP_KEY].as_object().is_some_and(serde_json::Map::is_empty)),
    )
    .await
    .unwrap()
    .unwrap();

    h.bus.publish(received(body.clone(), 100)).unwrap();
    let fulfilled = tokio::time::timeout(
        WAIT,
        h.recorder.wait_for(types::WARMUP_RESPONSE_FULFILLED, 2),
    )
    .await
    .unwrap();
    assert_eq!(fulfilled[1].str_field("key"), Some(key_of(&body).as_str()));
    assert_eq!(h.http.request_count(), 2);
}
