//! Configuration for pushcheck.
//!
//! Read from `~/.pushcheck/config.toml` (or an explicit path), then patched
//! from the environment:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PUSHCHECK_GATEWAY_URL` | `[gateway] endpoint` |
//! | `PUSHCHECK_ACCESS_TOKEN` | `[gateway] access_token` |
//!
//! String values may reference environment variables as `${NAME}`.
//!
//! ```toml
//! [gateway]
//! endpoint = "https://exp.host/--/api/v2/push/send"
//! access_token = "${EXPO_ACCESS_TOKEN}"
//! timeout_secs = 30
//!
//! [checks]
//! platform = "android"
//! experience_id = "@owner/slug"
//! manifest_present = true
//! settle_ms = 500
//! poll_interval_ms = 1000
//! poll_attempts = 5
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use pushcheck_types::{Platform, PlatformParseError};
use serde::Deserialize;
use thiserror::Error;

pub const GATEWAY_URL_ENV: &str = "PUSHCHECK_GATEWAY_URL";
pub const ACCESS_TOKEN_ENV: &str = "PUSHCHECK_ACCESS_TOKEN";

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid [checks] platform: {0}")]
    Platform(#[from] PlatformParseError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Platform(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PushcheckConfig {
    pub gateway: Option<GatewayConfig>,
    pub checks: Option<ChecksConfig>,
}

#[derive(Default, Deserialize)]
pub struct GatewayConfig {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub timeout_secs: Option<u64>,
}

// Manual Debug impl to prevent leaking the access token in logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.access_token.is_some() { "[REDACTED]" } else { "None" };
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("access_token", &token)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChecksConfig {
    pub platform: Option<String>,
    pub experience_id: Option<String>,
    /// Whether the app ships a manifest. Without one the bare-workflow
    /// experience id is used.
    #[serde(default = "default_true")]
    pub manifest_present: bool,
    pub settle_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub poll_attempts: Option<u32>,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            platform: None,
            experience_id: None,
            manifest_present: true,
            settle_ms: None,
            poll_interval_ms: None,
            poll_attempts: None,
        }
    }
}

/// Replace `${NAME}` references with `lookup(NAME)` (empty if unset).
fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        let end = start + 2 + end_rel;
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..end];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &rest[end + 1..];
    }

    out.push_str(rest);
    out
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".pushcheck").join("config.toml"))
}

impl PushcheckConfig {
    /// Load the default config file. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// Load `path`, treating a missing file as empty.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default().with_env_overrides());
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {:?}: {}", path, source);
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            tracing::warn!("Failed to parse config at {:?}: {}", path, source);
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(config.with_env_overrides())
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| env::var(name).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let gateway = self.gateway.get_or_insert_with(GatewayConfig::default);
        if let Some(endpoint) = lookup(GATEWAY_URL_ENV).filter(|v| !v.trim().is_empty()) {
            gateway.endpoint = Some(endpoint);
        }
        if let Some(token) = lookup(ACCESS_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            gateway.access_token = Some(token);
        }
        if let Some(token) = gateway.access_token.take() {
            let expanded = expand_with(&token, &lookup);
            gateway.access_token = Some(expanded).filter(|t| !t.trim().is_empty());
        }
        self
    }

    fn checks(&self) -> Option<&ChecksConfig> {
        self.checks.as_ref()
    }

    // Accessors return `None` for unset values; the consumers own the defaults.

    #[must_use]
    pub fn gateway_endpoint(&self) -> Option<&str> {
        self.gateway.as_ref().and_then(|g| g.endpoint.as_deref())
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.gateway.as_ref().and_then(|g| g.access_token.as_deref())
    }

    /// Request timeout; zero counts as unset.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.gateway
            .as_ref()
            .and_then(|g| g.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn platform(&self) -> Result<Platform, ConfigError> {
        match self.checks().and_then(|c| c.platform.as_deref()) {
            Some(raw) => Ok(Platform::parse(raw)?),
            None => Ok(Platform::default()),
        }
    }

    #[must_use]
    pub fn experience_id(&self) -> Option<&str> {
        self.checks().and_then(|c| c.experience_id.as_deref())
    }

    #[must_use]
    pub fn manifest_present(&self) -> bool {
        self.checks().is_none_or(|c| c.manifest_present)
    }

    #[must_use]
    pub fn settle_delay(&self) -> Option<Duration> {
        self.checks()
            .and_then(|c| c.settle_ms)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Option<Duration> {
        self.checks()
            .and_then(|c| c.poll_interval_ms)
            .map(Duration::from_millis)
    }

    #[must_use]
    pub fn poll_attempts(&self) -> Option<u32> {
        self.checks().and_then(|c| c.poll_attempts)
    }
}
