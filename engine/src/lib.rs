//! Push notification checks for pushcheck.
//!
//! # Architecture
//!
//! - [`checks`] - The scenarios: [`DeviceTokenCheck`], [`ExpoTokenCheck`], [`RoundtripCheck`]
//! - [`report`] - [`CheckOutcome`], [`CheckResult`] and the aggregated [`CheckReport`]
//!
//! [`run_all`] runs every scenario in order against one device and collects
//! the results. Each result is logged as it is recorded.

pub mod checks;
pub mod report;

use std::time::Duration;

use pushcheck_config::{ConfigError, PushcheckConfig};
use pushcheck_core::{CancellationToken, NotificationsApi, PollPolicy};
use pushcheck_gateway::{GatewayConfig, PushGateway};
use pushcheck_types::{ExpoPushTokenOptions, Platform, resolve_experience_id};

pub use checks::{DeviceTokenCheck, ExpoTokenCheck, ROUNDTRIP_MARKER_KEY, RoundtripCheck};
pub use report::{CheckOutcome, CheckReport, CheckResult};

pub use pushcheck_config;
pub use pushcheck_core;
pub use pushcheck_gateway;

const DEFAULT_SETTLE_MS: u64 = 500;

/// Tunables shared by the checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckSettings {
    pub platform: Platform,
    pub experience_id: Option<String>,
    pub manifest_present: bool,
    pub settle_delay: Duration,
    pub poll: PollPolicy,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            experience_id: None,
            manifest_present: true,
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            poll: PollPolicy::default(),
        }
    }
}

impl CheckSettings {
    /// Settings from `config`, with defaults for anything it leaves unset.
    pub fn from_config(config: &PushcheckConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            platform: config.platform()?,
            experience_id: config.experience_id().map(ToString::to_string),
            manifest_present: config.manifest_present(),
            settle_delay: config.settle_delay().unwrap_or(defaults.settle_delay),
            poll: PollPolicy::new(
                config.poll_interval().unwrap_or(defaults.poll.interval),
                config.poll_attempts().unwrap_or(defaults.poll.max_attempts),
            ),
        })
    }

    /// Options for Expo token requests. Without a manifest the bare-workflow
    /// experience id stands in for a missing configured one.
    #[must_use]
    pub fn expo_token_options(&self) -> ExpoPushTokenOptions {
        ExpoPushTokenOptions::with_experience_id(resolve_experience_id(
            self.experience_id.as_deref(),
            self.manifest_present,
        ))
    }
}

/// Gateway client settings from `config`, with defaults for anything it
/// leaves unset.
#[must_use]
pub fn gateway_config(config: &PushcheckConfig) -> GatewayConfig {
    let mut gateway = GatewayConfig::default();
    if let Some(endpoint) = config.gateway_endpoint() {
        gateway.endpoint = endpoint.to_string();
    }
    if let Some(timeout) = config.request_timeout() {
        gateway.timeout = timeout;
    }
    gateway.access_token = config.access_token().map(ToString::to_string);
    gateway
}

/// Run every check against `device`.
///
/// The roundtrip is skipped without a gateway. Once `cancel` fires, the
/// remaining checks are reported as skipped.
pub async fn run_all<D: NotificationsApi>(
    device: &D,
    gateway: Option<&PushGateway>,
    settings: &CheckSettings,
    cancel: &CancellationToken,
) -> CheckReport {
    tracing::info!(platform = %device.platform(), "Running push checks");
    let mut report = CheckReport::new();
    let skip_cancelled = || CheckOutcome::Skipped("cancelled".to_string());

    let outcome = if cancel.is_cancelled() {
        skip_cancelled()
    } else {
        DeviceTokenCheck {
            settle_delay: settings.settle_delay,
        }
        .run(device, cancel)
        .await
    };
    report.push(CheckResult::new(DeviceTokenCheck::NAME, outcome));

    let options = settings.expo_token_options();

    let outcome = if cancel.is_cancelled() {
        skip_cancelled()
    } else {
        ExpoTokenCheck {
            options: options.clone(),
        }
        .run(device, cancel)
        .await
    };
    report.push(CheckResult::new(ExpoTokenCheck::NAME, outcome));

    let outcome = match gateway {
        _ if cancel.is_cancelled() => skip_cancelled(),
        None => CheckOutcome::Skipped("no push gateway configured".to_string()),
        Some(gateway) => {
            RoundtripCheck {
                gateway,
                options,
                poll: settings.poll,
            }
            .run(device, cancel)
            .await
        }
    };
    report.push(CheckResult::new(RoundtripCheck::NAME, outcome));

    tracing::info!(
        passed = report.passed(),
        failed = report.failed(),
        skipped = report.skipped(),
        "Push checks finished"
    );
    report
}
