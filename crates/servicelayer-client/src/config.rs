//! Client configuration.
//!
//! The configuration is a flat record consumed by the client. Hosts load it
//! however they like (serde from a file, [`ServiceLayerConfig::from_env`],
//! or the builder-style setters) and hand it over explicitly.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{ClientError, Result};

/// Default session TTL in the store, in seconds (30 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 1800;

/// Default request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable prefix used by [`ServiceLayerConfig::from_env`].
pub const ENV_PREFIX: &str = "SERVICE_LAYER_";

/// Bounded retry applied to the login call on transient network failures.
///
/// Authentication failures (non-success status) are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LoginRetry {
    /// Total number of attempts, including the first one.
    #[serde(default = "default_login_attempts")]
    pub attempts: u32,
    /// Pause between attempts, in milliseconds.
    #[serde(default = "default_login_delay_ms")]
    pub delay_ms: u64,
}

fn default_login_attempts() -> u32 {
    3
}

fn default_login_delay_ms() -> u64 {
    100
}

impl Default for LoginRetry {
    fn default() -> Self {
        Self {
            attempts: default_login_attempts(),
            delay_ms: default_login_delay_ms(),
        }
    }
}

impl LoginRetry {
    /// No retry: a single attempt.
    pub fn none() -> Self {
        Self {
            attempts: 1,
            delay_ms: 0,
        }
    }

    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts.max(1) {
            return None;
        }
        Some(Duration::from_millis(self.delay_ms))
    }
}

/// Connection and session settings for one backend identity.
#[derive(Debug, Deserialize)]
pub struct ServiceLayerConfig {
    /// Base URL of the Service Layer, e.g. `https://host:50000/b1s/v1/`.
    #[serde(default)]
    pub server: String,
    /// Company database / tenant name.
    #[serde(default)]
    pub database: String,
    /// Principal used to log in.
    #[serde(default)]
    pub username: String,
    /// Password. Never logged; only exposed when building the login body.
    #[serde(default = "empty_secret", deserialize_with = "deserialize_secret")]
    pub password: SecretString,
    /// Session TTL in the store, in seconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl: u64,
    /// Number of independent session slots for this identity.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Fixed slot to bind to, overriding random selection.
    #[serde(default)]
    pub session_index: Option<usize>,
    /// Verify the server's TLS certificate.
    #[serde(default = "default_verify_ssl")]
    pub verify_ssl: bool,
    /// Per-request timeout, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Retry policy for the login call.
    #[serde(default)]
    pub login_retry: LoginRetry,
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_cache_ttl() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_pool_size() -> usize {
    1
}

fn default_verify_ssl() -> bool {
    true
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

// Custom deserialization for SecretString
fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<SecretString, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(SecretString::from(s))
}

impl Default for ServiceLayerConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            database: String::new(),
            username: String::new(),
            password: empty_secret(),
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            pool_size: 1,
            session_index: None,
            verify_ssl: true,
            timeout: DEFAULT_TIMEOUT_SECS,
            login_retry: LoginRetry::default(),
        }
    }
}

impl Clone for ServiceLayerConfig {
    fn clone(&self) -> Self {
        Self {
            server: self.server.clone(),
            database: self.database.clone(),
            username: self.username.clone(),
            password: SecretString::from(self.password.expose_secret().to_owned()),
            cache_ttl: self.cache_ttl,
            pool_size: self.pool_size,
            session_index: self.session_index,
            verify_ssl: self.verify_ssl,
            timeout: self.timeout,
            login_retry: self.login_retry,
        }
    }
}

impl ServiceLayerConfig {
    /// Configuration with the four required fields and defaults elsewhere.
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            database: database.into(),
            username: username.into(),
            password: SecretString::from(password.into()),
            ..Default::default()
        }
    }

    /// Read the configuration from `SERVICE_LAYER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if a numeric or boolean
    /// variable is malformed. Missing required fields are reported later by
    /// [`validate`](Self::validate).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (`SERVICE_LAYER_SERVER`, ...).
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            lookup(&format!("{ENV_PREFIX}{suffix}")).filter(|value| !value.trim().is_empty())
        };

        let mut config = Self::new(
            var("SERVER").unwrap_or_default(),
            var("DATABASE").unwrap_or_default(),
            var("USERNAME").unwrap_or_default(),
            var("PASSWORD").unwrap_or_default(),
        );

        if let Some(raw) = var("CACHE_TTL") {
            config.cache_ttl = parse_number("CACHE_TTL", &raw)?;
        }
        if let Some(raw) = var("POOL_SIZE") {
            config.pool_size = parse_number("POOL_SIZE", &raw)?;
        }
        if let Some(raw) = var("SESSION_INDEX") {
            config.session_index = Some(parse_number("SESSION_INDEX", &raw)?);
        }
        if let Some(raw) = var("VERIFY_SSL") {
            config.verify_ssl = parse_bool("VERIFY_SSL", &raw)?;
        }
        if let Some(raw) = var("TIMEOUT") {
            config.timeout = parse_number("TIMEOUT", &raw)?;
        }

        Ok(config)
    }

    /// Set the session TTL, in seconds.
    #[must_use]
    pub fn with_cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl = seconds;
        self
    }

    /// Set the number of session slots.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Pin every client built from this configuration to one slot.
    #[must_use]
    pub fn with_session_index(mut self, index: usize) -> Self {
        self.session_index = Some(index);
        self
    }

    /// Toggle TLS certificate verification.
    #[must_use]
    pub fn with_verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = verify;
        self
    }

    /// Set the per-request timeout, in seconds.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the login retry policy.
    #[must_use]
    pub fn with_login_retry(mut self, retry: LoginRetry) -> Self {
        self.login_retry = retry;
        self
    }

    /// Session TTL as a [`Duration`].
    pub fn cache_ttl_duration(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Check that everything needed to open a session is present.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] naming the first missing
    /// required field, or describing an invalid pool or timeout setting.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("server", self.server.trim().is_empty()),
            ("database", self.database.trim().is_empty()),
            ("username", self.username.trim().is_empty()),
            ("password", self.password.expose_secret().is_empty()),
        ];
        if let Some((name, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ClientError::configuration(format!(
                "missing required configuration: {name}"
            )));
        }

        if self.pool_size == 0 {
            return Err(ClientError::configuration("pool_size must be at least 1"));
        }

        if self.timeout == 0 {
            return Err(ClientError::configuration("timeout must be at least 1 second"));
        }

        if let Some(index) = self.session_index
            && index >= self.pool_size
        {
            return Err(ClientError::configuration(format!(
                "session_index {index} is out of range for pool_size {}",
                self.pool_size
            )));
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ClientError::configuration(format!("{ENV_PREFIX}{name} must be a non-negative integer, got '{raw}'"))
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::configuration(format!(
            "{ENV_PREFIX}{name} must be a boolean, got '{raw}'"
        ))),
    }
}
