//! Notification payload delivered to notification-received listeners.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub badge: Option<u32>,
    #[serde(default)]
    pub sound: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub identifier: String,
    pub content: NotificationContent,
    #[serde(default)]
    pub trigger: Option<Value>,
}

/// A notification as observed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Delivery time, milliseconds since the Unix epoch.
    pub date: i64,
    pub request: NotificationRequest,
}

impl Notification {
    #[must_use]
    pub fn new(identifier: impl Into<String>, content: NotificationContent, date: i64) -> Self {
        Self {
            date,
            request: NotificationRequest {
                identifier: identifier.into(),
                content,
                trigger: None,
            },
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.request.content.title.as_deref()
    }
}
