//! Core domain types for pushcheck.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod message;
mod notification;
mod receipt;

pub use message::{DEFAULT_TEST_TITLE, PushMessage, PushPriority};
pub use notification::{Notification, NotificationContent, NotificationRequest};
pub use receipt::{
    GatewayApiError, OneOrMany, PushReceipt, PushResponse, ReceiptDetails, ReceiptStatus,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// ============================================================================
// Platform
// ============================================================================

/// Platform the notification client runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Ios,
    Android,
    Web,
}

#[derive(Debug, Error)]
#[error("unknown platform {0:?} (expected ios, android or web)")]
pub struct PlatformParseError(pub String);

impl Platform {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Web => "web",
        }
    }

    pub fn parse(s: &str) -> Result<Self, PlatformParseError> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|platform| platform.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PlatformParseError(s.to_string()))
    }

    /// Whether the Expo push service can deliver to this platform.
    ///
    /// Web push goes through the browser's own push service instead.
    #[must_use]
    pub const fn supports_expo_push(self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }

    #[must_use]
    pub fn all() -> &'static [Platform] {
        &[Platform::Ios, Platform::Android, Platform::Web]
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Push Tokens
// ============================================================================

/// Raw token payload handed out by the platform.
///
/// Native platforms produce an opaque string (APNs/FCM registration id);
/// web produces a push subscription object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenData {
    Text(String),
    Object(Map<String, Value>),
}

impl TokenData {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenData::Text(text) => Some(text),
            TokenData::Object(_) => None,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            TokenData::Text(_) => "string",
            TokenData::Object(_) => "object",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenShapeError {
    #[error("{platform} device token must be a {expected}, got {actual}")]
    WrongKind {
        platform: Platform,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("push token data must not be empty")]
    Empty,
    #[error("expected token type \"expo\", got {0:?}")]
    NotExpo(String),
}

/// Native device push token as delivered by the platform.
///
/// Serialized as `{"type": "ios", "data": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePushToken {
    #[serde(rename = "type")]
    pub platform: Platform,
    pub data: TokenData,
}

impl DevicePushToken {
    #[must_use]
    pub fn text(platform: Platform, data: impl Into<String>) -> Self {
        Self {
            platform,
            data: TokenData::Text(data.into()),
        }
    }

    /// Check that the token data has the shape its platform produces.
    pub fn validate_shape(&self) -> Result<(), TokenShapeError> {
        let expected = match self.platform {
            Platform::Ios | Platform::Android => "string",
            Platform::Web => "object",
        };
        if self.data.kind() != expected {
            return Err(TokenShapeError::WrongKind {
                platform: self.platform,
                expected,
                actual: self.data.kind(),
            });
        }
        match &self.data {
            TokenData::Text(text) if text.trim().is_empty() => Err(TokenShapeError::Empty),
            TokenData::Object(map) if map.is_empty() => Err(TokenShapeError::Empty),
            _ => Ok(()),
        }
    }
}

pub const EXPO_TOKEN_TYPE: &str = "expo";

/// Push token issued by the Expo push service for a device token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpoPushToken {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: String,
}

impl ExpoPushToken {
    #[must_use]
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            kind: EXPO_TOKEN_TYPE.to_string(),
            data: data.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TokenShapeError> {
        if self.kind != EXPO_TOKEN_TYPE {
            return Err(TokenShapeError::NotExpo(self.kind.clone()));
        }
        if self.data.trim().is_empty() {
            return Err(TokenShapeError::Empty);
        }
        Ok(())
    }
}

/// Whether `token` has the `ExponentPushToken[...]` / `ExpoPushToken[...]` form.
#[must_use]
pub fn looks_like_expo_push_token(token: &str) -> bool {
    let inner = token
        .strip_prefix("ExponentPushToken[")
        .or_else(|| token.strip_prefix("ExpoPushToken["))
        .and_then(|rest| rest.strip_suffix(']'));
    inner.is_some_and(|inner| !inner.is_empty())
}

/// Experience used by bare-workflow builds, which have no app manifest.
pub const BARE_EXPERIENCE_ID: &str = "@exponent/bare-expo";

/// Options for exchanging a device token for an Expo push token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpoPushTokenOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub development: Option<bool>,
}

impl ExpoPushTokenOptions {
    #[must_use]
    pub fn with_experience_id(experience_id: Option<String>) -> Self {
        Self {
            experience_id,
            ..Self::default()
        }
    }
}

/// Pick the experience id for a push token request.
///
/// An explicit id always wins. Without one, builds that ship an app manifest
/// let the platform infer it; bare builds fall back to [`BARE_EXPERIENCE_ID`].
#[must_use]
pub fn resolve_experience_id(configured: Option<&str>, manifest_present: bool) -> Option<String> {
    match configured {
        Some(id) if !id.trim().is_empty() => Some(id.trim().to_string()),
        _ if manifest_present => None,
        _ => Some(BARE_EXPERIENCE_ID.to_string()),
    }
}
