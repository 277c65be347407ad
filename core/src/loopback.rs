//! In-process device.
//!
//! [`LoopbackDevice`] behaves like a registered handset without any platform
//! underneath: it hands out a fixed device token, announces it to push-token
//! listeners, derives an Expo token from it, and lets the host inject
//! notifications as if they had arrived from the push service.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pushcheck_types::{
    DevicePushToken, ExpoPushToken, ExpoPushTokenOptions, Notification, NotificationContent,
    Platform, PushMessage, TokenData,
};
use serde_json::{Map, Value};

use crate::device::{DeviceError, NotificationsApi};
use crate::subscription::{EventEmitter, Subscription};

struct Inner {
    platform: Platform,
    device_token: Result<DevicePushToken, DeviceError>,
    token_event_delay: Option<Duration>,
    announce_token: bool,
    token_listeners: EventEmitter<DevicePushToken>,
    notification_listeners: EventEmitter<Notification>,
    expo_requests: Mutex<Vec<ExpoPushTokenOptions>>,
    next_notification: AtomicU64,
}

/// Simulated device. Clones share listeners and state.
#[derive(Clone)]
pub struct LoopbackDevice {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LoopbackDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackDevice")
            .field("platform", &self.inner.platform)
            .field("token_listeners", &self.inner.token_listeners.listener_count())
            .field(
                "notification_listeners",
                &self.inner.notification_listeners.listener_count(),
            )
            .finish_non_exhaustive()
    }
}

/// Builder for [`LoopbackDevice`].
#[derive(Debug)]
pub struct LoopbackBuilder {
    platform: Platform,
    device_token: Result<DevicePushToken, DeviceError>,
    token_event_delay: Option<Duration>,
    announce_token: bool,
}

impl LoopbackBuilder {
    /// Announce the token to listeners `delay` after the request resolves
    /// instead of before it.
    #[must_use]
    pub fn token_event_delay(mut self, delay: Duration) -> Self {
        self.token_event_delay = Some(delay);
        self
    }

    /// Never announce the token to push-token listeners.
    #[must_use]
    pub fn silent_token_events(mut self) -> Self {
        self.announce_token = false;
        self
    }

    #[must_use]
    pub fn build(self) -> LoopbackDevice {
        LoopbackDevice {
            inner: Arc::new(Inner {
                platform: self.platform,
                device_token: self.device_token,
                token_event_delay: self.token_event_delay,
                announce_token: self.announce_token,
                token_listeners: EventEmitter::new("push-token"),
                notification_listeners: EventEmitter::new("notification-received"),
                expo_requests: Mutex::new(Vec::new()),
                next_notification: AtomicU64::new(1),
            }),
        }
    }
}

impl LoopbackDevice {
    /// A device whose registration yields `token`.
    #[must_use]
    pub fn builder(token: DevicePushToken) -> LoopbackBuilder {
        LoopbackBuilder {
            platform: token.platform,
            device_token: Ok(token),
            token_event_delay: None,
            announce_token: true,
        }
    }

    /// A native device with a string token.
    #[must_use]
    pub fn native(platform: Platform, token: impl Into<String>) -> Self {
        Self::builder(DevicePushToken::text(platform, token)).build()
    }

    /// A device shaped like a real one on `platform`: a string token on native
    /// platforms, a push subscription object on web.
    #[must_use]
    pub fn simulated(platform: Platform, id: &str) -> Self {
        let data = match platform {
            Platform::Web => {
                let mut subscription = Map::new();
                subscription.insert(
                    "endpoint".to_string(),
                    Value::String(format!("https://loopback.invalid/push/{id}")),
                );
                TokenData::Object(subscription)
            }
            Platform::Ios | Platform::Android => TokenData::Text(id.to_string()),
        };
        Self::builder(DevicePushToken { platform, data }).build()
    }

    /// A device whose token requests fail with `error`.
    #[must_use]
    pub fn failing(platform: Platform, error: DeviceError) -> Self {
        LoopbackBuilder {
            platform,
            device_token: Err(error),
            token_event_delay: None,
            announce_token: true,
        }
        .build()
    }

    #[must_use]
    pub fn token_listener_count(&self) -> usize {
        self.inner.token_listeners.listener_count()
    }

    #[must_use]
    pub fn notification_listener_count(&self) -> usize {
        self.inner.notification_listeners.listener_count()
    }

    /// Options passed to every Expo token request so far.
    #[must_use]
    pub fn expo_requests(&self) -> Vec<ExpoPushTokenOptions> {
        self.inner
            .expo_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hand `notification` to every notification-received listener.
    pub fn deliver(&self, notification: &Notification) -> usize {
        tracing::debug!(
            identifier = %notification.request.identifier,
            "Delivering notification"
        );
        self.inner.notification_listeners.emit(notification)
    }

    /// Deliver the notification the push service would produce for `message`.
    ///
    /// Built from the wire form, so overrides win over the typed fields.
    pub fn deliver_message(&self, message: &PushMessage) -> usize {
        match message.to_json() {
            Ok(wire) => self.deliver_wire(&wire),
            Err(err) => {
                tracing::warn!(error = %err, "Could not encode message for delivery");
                0
            }
        }
    }

    /// Deliver the notification for one message object as sent to the gateway.
    pub fn deliver_wire(&self, message: &Map<String, Value>) -> usize {
        let notification = self.notification_for(message);
        self.deliver(&notification)
    }

    fn notification_for(&self, message: &Map<String, Value>) -> Notification {
        let sequence = self.inner.next_notification.fetch_add(1, Ordering::Relaxed);
        let text = |key: &str| message.get(key).and_then(Value::as_str).map(str::to_string);
        let content = NotificationContent {
            title: text("title"),
            subtitle: text("subtitle"),
            body: text("body"),
            data: match message.get("data") {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            },
            badge: message
                .get("badge")
                .and_then(Value::as_u64)
                .and_then(|badge| u32::try_from(badge).ok()),
            sound: text("sound"),
        };
        let date = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX));
        Notification::new(format!("loopback-{sequence}"), content, date)
    }

    fn announce(&self, token: &DevicePushToken) {
        if !self.inner.announce_token {
            return;
        }
        match self.inner.token_event_delay {
            None => {
                self.inner.token_listeners.emit(token);
            }
            Some(delay) => {
                let listeners = self.inner.token_listeners.clone();
                let token = token.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    listeners.emit(&token);
                });
            }
        }
    }
}

impl NotificationsApi for LoopbackDevice {
    fn platform(&self) -> Platform {
        self.inner.platform
    }

    async fn get_device_push_token(&self) -> Result<DevicePushToken, DeviceError> {
        let token = self.inner.device_token.clone()?;
        self.announce(&token);
        Ok(token)
    }

    async fn get_expo_push_token(
        &self,
        options: &ExpoPushTokenOptions,
    ) -> Result<ExpoPushToken, DeviceError> {
        self.inner
            .expo_requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(options.clone());

        if !self.inner.platform.supports_expo_push() {
            return Err(DeviceError::Unsupported(self.inner.platform));
        }
        let token = self.inner.device_token.clone()?;
        token
            .data
            .as_text()
            .map(|data| ExpoPushToken::new(format!("ExponentPushToken[{data}]")))
            .ok_or(DeviceError::Unsupported(self.inner.platform))
    }

    fn add_push_token_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&DevicePushToken) + Send + Sync + 'static,
    {
        self.inner.token_listeners.add_listener(listener)
    }

    fn add_notification_received_listener<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.inner.notification_listeners.add_listener(listener)
    }
}
