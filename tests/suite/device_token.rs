//! Direct token request versus push-token event

use std::time::Duration;

use pushcheck_core::{
    CancellationToken, CorrelationOutcome, Correlator, DeviceError, LoopbackDevice,
    NotificationsApi,
};
use pushcheck_engine::{CheckOutcome, DeviceTokenCheck};
use pushcheck_types::{DevicePushToken, Platform, TokenData};
use serde_json::{Map, Value};

const SETTLE: Duration = Duration::from_millis(500);

#[tokio::test(start_paused = true)]
async fn event_before_settle_matches_direct_token() {
    let device = LoopbackDevice::builder(DevicePushToken::text(Platform::Ios, "abc123"))
        .token_event_delay(Duration::from_millis(100))
        .build();
    let correlator = Correlator::new();
    let subscription = device.add_push_token_listener(correlator.event_recorder());

    let token = device.get_device_push_token().await.unwrap();
    correlator.record_direct(token).unwrap();
    let settled = correlator.settle(SETTLE).await;

    assert!(settled.matches());
    assert_eq!(settled.outcome(), CorrelationOutcome::Matched);
    assert_eq!(
        settled.event,
        Some(DevicePushToken::text(Platform::Ios, "abc123"))
    );
    assert!(subscription.remove());
    assert_eq!(device.token_listener_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_event_is_a_mismatch() {
    let device = LoopbackDevice::builder(DevicePushToken::text(Platform::Ios, "abc123"))
        .silent_token_events()
        .build();
    let correlator = Correlator::new();
    let _subscription = device.add_push_token_listener(correlator.event_recorder());

    correlator
        .record_direct(device.get_device_push_token().await.unwrap())
        .unwrap();
    let settled = correlator.settle(SETTLE).await;

    assert!(!settled.matches());
    assert_eq!(settled.outcome(), CorrelationOutcome::EventMissing);
}

#[tokio::test(start_paused = true)]
async fn failed_request_needs_no_event() {
    let device = LoopbackDevice::failing(Platform::Android, DeviceError::PermissionDenied);
    let correlator = Correlator::<DevicePushToken>::new();
    let _subscription = device.add_push_token_listener(correlator.event_recorder());

    assert_eq!(
        device.get_device_push_token().await,
        Err(DeviceError::PermissionDenied)
    );
    let settled = correlator.settle(SETTLE).await;
    assert!(settled.matches());
    assert_eq!(settled.outcome(), CorrelationOutcome::BothAbsent);

    let outcome = DeviceTokenCheck {
        settle_delay: SETTLE,
    }
    .run(&device, &CancellationToken::new())
    .await;
    assert!(outcome.is_skipped(), "{outcome:?}");
}

#[tokio::test(start_paused = true)]
async fn web_token_is_an_object() {
    let mut subscription = Map::new();
    subscription.insert(
        "endpoint".to_string(),
        Value::from("https://push.example/sub/1"),
    );
    let device = LoopbackDevice::builder(DevicePushToken {
        platform: Platform::Web,
        data: TokenData::Object(subscription),
    })
    .build();

    let outcome = DeviceTokenCheck {
        settle_delay: SETTLE,
    }
    .run(&device, &CancellationToken::new())
    .await;
    assert_eq!(outcome, CheckOutcome::Passed);
}

#[tokio::test(start_paused = true)]
async fn event_driven_settle_returns_on_arrival() {
    let device = LoopbackDevice::builder(DevicePushToken::text(Platform::Ios, "abc123"))
        .token_event_delay(Duration::from_millis(50))
        .build();
    let correlator = Correlator::new();
    let _subscription = device.add_push_token_listener(correlator.event_recorder());

    let start = tokio::time::Instant::now();
    correlator
        .record_direct(device.get_device_push_token().await.unwrap())
        .unwrap();
    let settled = correlator.settle_or_arrival(SETTLE).await;

    assert_eq!(settled.outcome(), CorrelationOutcome::Matched);
    assert!(start.elapsed() < SETTLE);
}
