//! The platform notification API, as seen by a check.

use std::future::Future;

use pushcheck_types::{
    DevicePushToken, ExpoPushToken, ExpoPushTokenOptions, Notification, Platform,
};
use thiserror::Error;

use crate::subscription::Subscription;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("notification permission was not granted")]
    PermissionDenied,
    #[error("push token registration failed: {0}")]
    Registration(String),
    #[error("{0} does not support Expo push tokens")]
    Unsupported(Platform),
}

/// Token and notification surface of a device.
///
/// Listener registrations return [`Subscription`]s; the caller owns them and
/// releases them when its check ends.
pub trait NotificationsApi: Send + Sync {
    fn platform(&self) -> Platform;

    /// Request the native push token. Platforms also announce the token to
    /// push-token listeners when registration completes.
    fn get_device_push_token(
        &self,
    ) -> impl Future<Output = Result<DevicePushToken, DeviceError>> + Send;

    /// Exchange the device token for an Expo push token.
    fn get_expo_push_token(
        &self,
        options: &ExpoPushTokenOptions,
    ) -> impl Future<Output = Result<ExpoPushToken, DeviceError>> + Send;

    fn add_push_token_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DevicePushToken) + Send + Sync + 'static;

    fn add_notification_received_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static;
}
