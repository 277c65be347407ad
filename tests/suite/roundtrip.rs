//! Send a test push through a mock gateway and wait for it on the device

use std::time::Duration;

use pushcheck_core::{CancellationToken, LoopbackDevice, PollPolicy};
use pushcheck_engine::{
    CheckOutcome, DeviceTokenCheck, ExpoTokenCheck, ROUNDTRIP_MARKER_KEY, RoundtripCheck, run_all,
};
use pushcheck_types::{
    DEFAULT_TEST_TITLE, DevicePushToken, ExpoPushTokenOptions, Platform, TokenData,
};
use serde_json::Map;

use crate::common::{
    fast_settings, gateway_for, mount_delivering_gateway, mount_error_receipt, mount_ok_gateway,
    sent_bodies, start_gateway_mock,
};

fn roundtrip(gateway: &pushcheck_gateway::PushGateway) -> RoundtripCheck<'_> {
    RoundtripCheck {
        gateway,
        options: ExpoPushTokenOptions::default(),
        poll: PollPolicy::new(Duration::from_millis(20), 3),
    }
}

#[tokio::test]
async fn delivered_notification_passes() {
    let server = start_gateway_mock().await;
    let device = LoopbackDevice::native(Platform::Android, "fcm-1");
    mount_delivering_gateway(&server, device.clone()).await;
    let gateway = gateway_for(&server);

    let outcome = roundtrip(&gateway)
        .run(&device, &CancellationToken::new())
        .await;

    assert_eq!(outcome, CheckOutcome::Passed);
    assert_eq!(device.notification_listener_count(), 0);

    let bodies = sent_bodies(&server).await;
    assert_eq!(bodies.len(), 1);
    let sent = &bodies[0][0];
    assert_eq!(sent["to"], "ExponentPushToken[fcm-1]");
    assert_eq!(sent["title"], DEFAULT_TEST_TITLE);
    assert!(sent["data"][ROUNDTRIP_MARKER_KEY].is_string());
}

#[tokio::test]
async fn undelivered_notification_fails_after_polling() {
    let server = start_gateway_mock().await;
    mount_ok_gateway(&server).await;
    let gateway = gateway_for(&server);
    let device = LoopbackDevice::native(Platform::Ios, "apns-1");

    let outcome = roundtrip(&gateway)
        .run(&device, &CancellationToken::new())
        .await;

    assert_eq!(
        outcome,
        CheckOutcome::Failed("test notification not received after 3 checks".to_string())
    );
    assert_eq!(device.notification_listener_count(), 0);
}

#[tokio::test]
async fn unrelated_notifications_do_not_count() {
    let server = start_gateway_mock().await;
    mount_ok_gateway(&server).await;
    let gateway = gateway_for(&server);
    let device = LoopbackDevice::native(Platform::Ios, "apns-1");

    let stray = device.clone();
    let check = roundtrip(&gateway);
    let cancel = CancellationToken::new();
    let outcome = tokio::join!(
        check.run(&device, &cancel),
        async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            stray.deliver_message(&pushcheck_types::PushMessage::test("ExponentPushToken[apns-1]"));
        }
    )
    .0;

    assert!(outcome.is_failed(), "{outcome:?}");
}

#[tokio::test]
async fn gateway_error_receipt_fails_roundtrip() {
    let server = start_gateway_mock().await;
    mount_error_receipt(&server, "DeviceNotRegistered").await;
    let gateway = gateway_for(&server);
    let device = LoopbackDevice::native(Platform::Android, "fcm-1");

    let outcome = roundtrip(&gateway)
        .run(&device, &CancellationToken::new())
        .await;

    assert!(outcome.is_failed());
    assert!(
        outcome.reason().is_some_and(|r| r.contains("DeviceNotRegistered")),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn web_devices_skip_roundtrip_without_sending() {
    let server = start_gateway_mock().await;
    mount_ok_gateway(&server).await;
    let gateway = gateway_for(&server);
    let device = LoopbackDevice::builder(DevicePushToken {
        platform: Platform::Web,
        data: TokenData::Object(Map::new()),
    })
    .build();

    let outcome = roundtrip(&gateway)
        .run(&device, &CancellationToken::new())
        .await;

    assert!(outcome.is_skipped());
    assert!(sent_bodies(&server).await.is_empty());
}

#[tokio::test]
async fn cancelled_roundtrip_is_skipped() {
    let server = start_gateway_mock().await;
    mount_ok_gateway(&server).await;
    let gateway = gateway_for(&server);
    let device = LoopbackDevice::native(Platform::Ios, "apns-1");
    let cancel = CancellationToken::new();

    let check = RoundtripCheck {
        gateway: &gateway,
        options: ExpoPushTokenOptions::default(),
        poll: PollPolicy::new(Duration::from_secs(30), 5),
    };
    let canceller = cancel.clone();
    let outcome = tokio::join!(check.run(&device, &cancel), async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    })
    .0;

    assert_eq!(outcome, CheckOutcome::Skipped("cancelled".to_string()));
    assert_eq!(device.notification_listener_count(), 0);
}

#[tokio::test]
async fn run_all_against_delivering_gateway_passes() {
    let server = start_gateway_mock().await;
    let device = LoopbackDevice::native(Platform::Android, "fcm-1");
    mount_delivering_gateway(&server, device.clone()).await;
    let gateway = gateway_for(&server);

    let report = run_all(
        &device,
        Some(&gateway),
        &fast_settings(),
        &CancellationToken::new(),
    )
    .await;

    assert!(report.is_success(), "{report}");
    assert_eq!(report.passed(), 3);
    assert_eq!(
        report
            .results()
            .iter()
            .map(|result| result.name)
            .collect::<Vec<_>>(),
        [DeviceTokenCheck::NAME, ExpoTokenCheck::NAME, RoundtripCheck::NAME]
    );
    assert_eq!(device.token_listener_count(), 0);
    assert_eq!(device.notification_listener_count(), 0);
}
