//! Outbound push message as accepted by the push gateway.

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Title used for test notifications when the caller does not override it.
pub const DEFAULT_TEST_TITLE: &str = "Hello from Expo server!";

/// Delivery priority hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushPriority {
    #[default]
    Default,
    Normal,
    High,
}

/// A single push request.
///
/// Known fields are typed; anything else the gateway accepts goes into
/// `overrides`, which is merged last so it can replace typed fields too.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PushMessage {
    pub to: String,
    pub title: String,
    pub body: Option<String>,
    pub data: Option<Value>,
    pub sound: Option<String>,
    pub badge: Option<u32>,
    pub ttl: Option<u32>,
    pub priority: Option<PushPriority>,
    pub channel_id: Option<String>,
    pub overrides: Map<String, Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireFields<'a> {
    to: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sound: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<PushPriority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_id: Option<&'a str>,
}

impl PushMessage {
    /// A test notification addressed to `to` with the default title.
    #[must_use]
    pub fn test(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            title: DEFAULT_TEST_TITLE.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_overrides(mut self, overrides: Map<String, Value>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    /// The JSON object sent on the wire.
    pub fn to_json(&self) -> serde_json::Result<Map<String, Value>> {
        let fields = WireFields {
            to: &self.to,
            title: &self.title,
            body: self.body.as_deref(),
            data: self.data.as_ref(),
            sound: self.sound.as_deref(),
            badge: self.badge,
            ttl: self.ttl,
            priority: self.priority,
            channel_id: self.channel_id.as_deref(),
        };
        let mut object = match serde_json::to_value(fields)? {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        for (key, value) in &self.overrides {
            object.insert(key.clone(), value.clone());
        }
        Ok(object)
    }
}

impl Serialize for PushMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}
