//! Client configuration
//!
//! Backend location and request policy, passed explicitly into the transport
//! and auth clients. Stored as JSON.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for outgoing messages
///
/// Only network failures are retried. `max_attempts` counts the first try, so
/// the default of 1 means no retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per message, including the first
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether another attempt is allowed after `attempt` attempts have failed
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Backoff before retry number `attempt` (1-based): `base * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let delay = self.base_delay_ms.saturating_mul(2_u64.pow(exponent));
        Duration::from_millis(delay.min(self.max_delay_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

/// Chat client configuration
///
/// # Example
/// ```rust,no_run
/// use coursechat::config::ChatConfig;
///
/// // Load config (returns default if file doesn't exist)
/// let config = ChatConfig::load("coursechat.json").expect("Failed to load");
/// println!("Sending to {}", config.endpoint(&config.send_path));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Backend base URL
    pub base_url: String,
    /// Path of the history endpoint (GET)
    pub history_path: String,
    /// Path of the send endpoint (POST)
    pub send_path: String,
    /// Path of the login endpoint (POST)
    pub login_path: String,
    /// Path of the registration endpoint (POST)
    pub register_path: String,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Retry policy for sends
    pub retry: RetryPolicy,
}

impl ChatConfig {
    /// Create a default config pointing at `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file
    ///
    /// Returns the default config if the file doesn't exist or is empty.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_json::from_str(&data)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;

        Ok(config)
    }

    /// Save config to a JSON file, creating parent directories
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Reject configs the clients cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Full URL for an endpoint path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            history_path: "/api/messages".to_string(),
            send_path: "/sample-page".to_string(),
            login_path: "/login".to_string(),
            register_path: "/register".to_string(),
            request_timeout_ms: 30_000,
            retry: RetryPolicy::default(),
        }
    }
}
