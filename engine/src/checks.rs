//! The individual check scenarios.
//!
//! Each check owns the subscriptions it creates for exactly as long as it
//! runs; they are released when `run` returns, whichever way it returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pushcheck_core::{
    CancellationToken, CorrelationOutcome, Correlator, DeviceError, LatestEvent,
    NotificationsApi, PollOutcome, PollPolicy, poll_for,
};
use pushcheck_gateway::PushGateway;
use pushcheck_types::{DevicePushToken, ExpoPushTokenOptions, Notification};
use serde_json::{Map, Value};

use crate::report::CheckOutcome;

/// Data key carrying the per-run marker in roundtrip notifications.
pub const ROUNDTRIP_MARKER_KEY: &str = "pushcheckMarker";

fn cancelled() -> CheckOutcome {
    CheckOutcome::skipped("cancelled")
}

/// Requests the native device token and checks that the push-token event
/// announces the same token.
#[derive(Debug, Clone)]
pub struct DeviceTokenCheck {
    pub settle_delay: Duration,
}

impl DeviceTokenCheck {
    pub const NAME: &'static str = "device-token";

    pub async fn run<D: NotificationsApi>(
        &self,
        device: &D,
        cancel: &CancellationToken,
    ) -> CheckOutcome {
        let correlator = Correlator::<DevicePushToken>::new();
        let _subscription = device.add_push_token_listener(correlator.event_recorder());

        let request_error = match device.get_device_push_token().await {
            Ok(token) => {
                if let Err(err) = token.validate_shape() {
                    return CheckOutcome::failed(format!("device token has the wrong shape: {err}"));
                }
                if let Err(err) = correlator.record_direct(token) {
                    return CheckOutcome::failed(err.to_string());
                }
                None
            }
            Err(err) => {
                tracing::debug!(error = %err, "Device token request failed");
                Some(err)
            }
        };

        let settled = tokio::select! {
            biased;
            () = cancel.cancelled() => return cancelled(),
            settled = correlator.settle(self.settle_delay) => settled,
        };
        tracing::debug!(
            outcome = settled.outcome().as_str(),
            events_seen = settled.events_seen,
            "Device token settled"
        );

        match (settled.outcome(), request_error) {
            (CorrelationOutcome::Matched, _) => CheckOutcome::Passed,
            (CorrelationOutcome::Mismatched, _) => CheckOutcome::failed(
                "push-token event carried a different token than the direct request",
            ),
            (CorrelationOutcome::EventMissing, _) => CheckOutcome::failed(format!(
                "no push-token event within {} ms",
                self.settle_delay.as_millis()
            )),
            (CorrelationOutcome::DirectMissing, error) => CheckOutcome::failed(format!(
                "push-token event arrived but the direct request failed: {}",
                error.map_or_else(|| "no token".to_string(), |e| e.to_string())
            )),
            (CorrelationOutcome::BothAbsent, Some(error)) => {
                CheckOutcome::skipped(format!("device token unavailable: {error}"))
            }
            (CorrelationOutcome::BothAbsent, None) => {
                CheckOutcome::skipped("device token unavailable")
            }
        }
    }
}

/// Requests an Expo push token and checks its type and payload.
#[derive(Debug, Clone, Default)]
pub struct ExpoTokenCheck {
    pub options: ExpoPushTokenOptions,
}

impl ExpoTokenCheck {
    pub const NAME: &'static str = "expo-token";

    pub async fn run<D: NotificationsApi>(
        &self,
        device: &D,
        cancel: &CancellationToken,
    ) -> CheckOutcome {
        if !device.platform().supports_expo_push() {
            return CheckOutcome::skipped(format!(
                "{} does not support Expo push tokens",
                device.platform()
            ));
        }

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return cancelled(),
            result = device.get_expo_push_token(&self.options) => result,
        };
        match result {
            Ok(token) => match token.validate() {
                Ok(()) => CheckOutcome::Passed,
                Err(err) => CheckOutcome::failed(format!("invalid Expo push token: {err}")),
            },
            Err(DeviceError::Unsupported(platform)) => {
                CheckOutcome::skipped(format!("{platform} does not support Expo push tokens"))
            }
            Err(err) => CheckOutcome::failed(format!("Expo push token request failed: {err}")),
        }
    }
}

/// Sends a test push to the device's Expo token and waits for it to be
/// received.
#[derive(Debug, Clone)]
pub struct RoundtripCheck<'a> {
    pub gateway: &'a PushGateway,
    pub options: ExpoPushTokenOptions,
    pub poll: PollPolicy,
}

impl RoundtripCheck<'_> {
    pub const NAME: &'static str = "roundtrip";

    pub async fn run<D: NotificationsApi>(
        &self,
        device: &D,
        cancel: &CancellationToken,
    ) -> CheckOutcome {
        if !device.platform().supports_expo_push() {
            return CheckOutcome::skipped(format!(
                "{} cannot receive Expo pushes",
                device.platform()
            ));
        }

        let token = match device.get_expo_push_token(&self.options).await {
            Ok(token) => token,
            Err(DeviceError::Unsupported(platform)) => {
                return CheckOutcome::skipped(format!("{platform} cannot receive Expo pushes"));
            }
            Err(err) => {
                return CheckOutcome::failed(format!("Expo push token request failed: {err}"));
            }
        };

        let marker = next_marker();
        let received = LatestEvent::<Notification>::new();
        let _subscription = device.add_notification_received_listener({
            let received = received.clone();
            let marker = marker.clone();
            move |notification: &Notification| {
                if carries_marker(notification, &marker) {
                    received.record(notification.clone());
                }
            }
        });

        let mut data = Map::new();
        data.insert(ROUNDTRIP_MARKER_KEY.to_string(), Value::String(marker.clone()));
        let mut overrides = Map::new();
        overrides.insert("data".to_string(), Value::Object(data));

        let sent = tokio::select! {
            biased;
            () = cancel.cancelled() => return cancelled(),
            sent = self.gateway.send_test_notification(&token.data, overrides) => sent,
        };
        if let Err(err) = sent {
            return CheckOutcome::failed(format!("sending the test notification failed: {err}"));
        }
        tracing::debug!(%marker, "Test notification accepted, waiting for delivery");

        match poll_for(|| received.get(), self.poll, cancel).await {
            PollOutcome::Ready { value, attempts } => {
                tracing::debug!(
                    identifier = %value.request.identifier,
                    attempts,
                    "Test notification received"
                );
                CheckOutcome::Passed
            }
            PollOutcome::Exhausted { attempts } => CheckOutcome::failed(format!(
                "test notification not received after {attempts} checks"
            )),
            PollOutcome::Cancelled { .. } => cancelled(),
        }
    }
}

fn carries_marker(notification: &Notification, marker: &str) -> bool {
    notification
        .request
        .content
        .data
        .get(ROUNDTRIP_MARKER_KEY)
        .and_then(Value::as_str)
        == Some(marker)
}

fn next_marker() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:x}-{sequence}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pushcheck_core::LoopbackDevice;
    use pushcheck_types::{DevicePushToken, NotificationContent, Platform, TokenData};

    fn check() -> DeviceTokenCheck {
        DeviceTokenCheck {
            settle_delay: Duration::from_millis(500),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn device_token_matches_announced_token() {
        let device = LoopbackDevice::native(Platform::Ios, "abc123");
        let outcome = check().run(&device, &CancellationToken::new()).await;
        assert_eq!(outcome, CheckOutcome::Passed);
        assert_eq!(device.token_listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_token_late_event_is_missing() {
        let device = LoopbackDevice::builder(DevicePushToken::text(Platform::Ios, "abc123"))
            .token_event_delay(Duration::from_millis(800))
            .build();
        let outcome = check().run(&device, &CancellationToken::new()).await;
        assert_eq!(
            outcome,
            CheckOutcome::failed("no push-token event within 500 ms")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn device_token_failure_is_skipped() {
        let device = LoopbackDevice::failing(Platform::Android, DeviceError::PermissionDenied);
        let outcome = check().run(&device, &CancellationToken::new()).await;
        assert!(outcome.is_skipped(), "{outcome:?}");
        assert!(outcome.reason().is_some_and(|r| r.contains("permission")));
    }

    #[tokio::test(start_paused = true)]
    async fn device_token_wrong_shape_fails() {
        let device = LoopbackDevice::builder(DevicePushToken {
            platform: Platform::Web,
            data: TokenData::Text("not-an-object".to_string()),
        })
        .build();
        let outcome = check().run(&device, &CancellationToken::new()).await;
        assert!(outcome.is_failed(), "{outcome:?}");
        assert_eq!(device.token_listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn device_token_cancel_during_settle() {
        let device = LoopbackDevice::builder(DevicePushToken::text(Platform::Ios, "abc123"))
            .silent_token_events()
            .build();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = check().run(&device, &cancel).await;
        assert_eq!(outcome, cancelled());
    }

    #[tokio::test]
    async fn expo_token_passes_and_uses_options() {
        let device = LoopbackDevice::native(Platform::Android, "fcm-1");
        let options = ExpoPushTokenOptions::with_experience_id(Some("@me/app".to_string()));
        let check = ExpoTokenCheck {
            options: options.clone(),
        };

        assert_eq!(
            check.run(&device, &CancellationToken::new()).await,
            CheckOutcome::Passed
        );
        assert_eq!(device.expo_requests(), vec![options]);
    }

    #[tokio::test]
    async fn expo_token_skipped_on_web() {
        let device = LoopbackDevice::builder(DevicePushToken {
            platform: Platform::Web,
            data: TokenData::Object(Map::new()),
        })
        .build();
        let outcome = ExpoTokenCheck::default()
            .run(&device, &CancellationToken::new())
            .await;
        assert!(outcome.is_skipped());
        assert!(device.expo_requests().is_empty());
    }

    #[tokio::test]
    async fn expo_token_request_failure_fails() {
        let device = LoopbackDevice::failing(
            Platform::Ios,
            DeviceError::Registration("apns unavailable".to_string()),
        );
        let outcome = ExpoTokenCheck::default()
            .run(&device, &CancellationToken::new())
            .await;
        assert!(outcome.is_failed());
    }

    #[test]
    fn marker_matching_ignores_other_notifications() {
        let mut data = Map::new();
        data.insert(ROUNDTRIP_MARKER_KEY.to_string(), Value::from("m-1"));
        let ours = Notification::new(
            "a",
            NotificationContent {
                data,
                ..NotificationContent::default()
            },
            0,
        );
        let other = Notification::new("b", NotificationContent::default(), 0);

        assert!(carries_marker(&ours, "m-1"));
        assert!(!carries_marker(&ours, "m-2"));
        assert!(!carries_marker(&other, "m-1"));
        assert_ne!(next_marker(), next_marker());
    }
}
