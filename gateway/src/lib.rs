//! Push delivery gateway client.
//!
//! # Architecture
//!
//! - [`PushGateway`] - POSTs a batch of [`PushMessage`]s and returns the receipts
//! - [`interpret_response`] - Turns a decoded response body into receipts or a [`GatewayError`]
//!
//! # Error Handling
//!
//! The gateway reports failure two ways, and both become errors:
//!
//! | Report | Error |
//! |--------|-------|
//! | Non-empty top-level `errors` array | [`GatewayError::Api`] |
//! | Receipt with `status: "error"` | [`GatewayError::Receipt`] |
//!
//! Each reported error is also logged as a warning, along with any `__debug`
//! payload. Transport failures, non-2xx statuses without an `errors` body,
//! and undecodable bodies have their own variants.

mod error;

pub use error::GatewayError;

use std::time::Duration;

use pushcheck_types::{OneOrMany, PushMessage, PushReceipt, PushResponse};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use url::{Host, Url};

pub use pushcheck_types;

/// Canonical Expo push send endpoint.
pub const EXPO_PUSH_SEND_URL: &str = "https://exp.host/--/api/v2/push/send";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Where and how to reach the gateway.
#[derive(Clone)]
pub struct GatewayConfig {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: EXPO_PUSH_SEND_URL.to_string(),
            access_token: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    #[must_use]
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }
}

// Manual Debug impl to prevent leaking the access token in logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field(
                "access_token",
                &if self.access_token.is_some() { "[REDACTED]" } else { "None" },
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Plain `http` is accepted only for loopback hosts (local mock servers).
fn validate_endpoint(raw: &str) -> Result<(Url, bool), GatewayError> {
    let invalid = |reason: &str| GatewayError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    match url.scheme() {
        "https" => Ok((url, false)),
        "http" => {
            let loopback = match url.host() {
                Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
                Some(Host::Ipv4(ip)) => ip.is_loopback(),
                Some(Host::Ipv6(ip)) => ip.is_loopback(),
                None => false,
            };
            if loopback {
                Ok((url, true))
            } else {
                Err(invalid("plain http is only allowed for loopback hosts"))
            }
        }
        other => Err(invalid(&format!("unsupported scheme {other:?}"))),
    }
}

fn default_headers(access_token: Option<&str>) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = access_token.filter(|t| !t.trim().is_empty()) {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.trim()))
            .map_err(|_| GatewayError::InvalidAccessToken)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

/// Client for the push send endpoint.
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl PushGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let (endpoint, allow_http) = validate_endpoint(&config.endpoint)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .https_only(!allow_http)
            .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
            .default_headers(default_headers(config.access_token.as_deref())?)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Send `messages` in one request and return the per-message receipts.
    pub async fn send(&self, messages: &[PushMessage]) -> Result<Vec<PushReceipt>, GatewayError> {
        let body = serde_json::to_vec(messages).map_err(GatewayError::Encode)?;
        tracing::debug!(
            endpoint = %self.endpoint,
            messages = messages.len(),
            "Sending push request"
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .body(body)
            .send()
            .await
            .map_err(GatewayError::Transport)?;

        let status = response.status();
        let (bytes, truncated) = read_capped_body(response, MAX_RESPONSE_BYTES).await?;
        let text = String::from_utf8_lossy(&bytes);

        if !status.is_success() {
            // The gateway explains most rejections in an `errors` body.
            if !truncated
                && let Ok(parsed) = serde_json::from_str::<PushResponse>(&text)
                && parsed.errors.as_ref().is_some_and(|errors| !errors.is_empty())
            {
                return interpret_response(parsed);
            }
            return Err(GatewayError::Status {
                status,
                body: cap_error_body(&text),
            });
        }

        let parsed: PushResponse =
            serde_json::from_str(&text).map_err(|source| GatewayError::Decode {
                source,
                body: cap_error_body(&text),
            })?;
        interpret_response(parsed)
    }

    /// Send a single test notification to `to`.
    ///
    /// `overrides` are merged into the message last and may replace any field.
    pub async fn send_test_notification(
        &self,
        to: &str,
        overrides: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Vec<PushReceipt>, GatewayError> {
        let message = PushMessage::test(to).with_overrides(overrides);
        self.send(std::slice::from_ref(&message)).await
    }
}

async fn read_capped_body(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), GatewayError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(GatewayError::Transport)? {
        body.extend_from_slice(&chunk);
        if body.len() > limit {
            body.truncate(limit);
            return Ok((body, true));
        }
    }
    Ok((body, false))
}

fn cap_error_body(text: &str) -> String {
    if text.len() <= MAX_ERROR_BODY_BYTES {
        return text.to_string();
    }
    let mut end = MAX_ERROR_BODY_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &text[..end])
}

/// Decide whether a decoded response reports success.
///
/// A non-empty `errors` array wins over receipts. Otherwise the first receipt
/// with `status: "error"` fails the whole batch. A body with neither is an
/// empty success.
pub fn interpret_response(response: PushResponse) -> Result<Vec<PushReceipt>, GatewayError> {
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        for error in &errors {
            tracing::warn!(
                code = error.code.as_deref().unwrap_or("unknown"),
                message = %error.message,
                "API error sending push notification"
            );
        }
        return Err(GatewayError::Api(errors));
    }

    let receipts = response.data.map(OneOrMany::into_vec).unwrap_or_default();
    if let Some(receipt) = receipts.iter().find(|receipt| receipt.is_error()) {
        if let Some(code) = receipt.error_code() {
            tracing::warn!(
                error = code,
                "Push service reported an error sending a notification"
            );
        }
        if let Some(debug_payload) = &receipt.debug {
            tracing::warn!(debug = %debug_payload, "Push service debug payload");
        }
        return Err(GatewayError::receipt(receipt.clone()));
    }

    Ok(receipts)
}
