//! Client configuration.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, SignatureAlgorithm};

/// Default `Authorization` credential scheme.
pub const DEFAULT_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// Environment variable overrides read by [`ClientConfig::from_env`].
pub mod env {
    pub const CLOCK_SKEW_SECS: &str = "PAYSIGN_CLOCK_SKEW_SECS";
    pub const ALGORITHM: &str = "PAYSIGN_ALGORITHM";
    pub const SCHEME: &str = "PAYSIGN_SCHEME";
    pub const BASE_URL: &str = "PAYSIGN_BASE_URL";
    pub const REPLAY_CACHE: &str = "PAYSIGN_REPLAY_CACHE";
}

/// Settings shared by the signer, verifier and client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Maximum distance between a response timestamp and local time.
    #[serde(default = "default_clock_skew")]
    pub clock_skew_tolerance_secs: u64,

    /// Signature algorithm for requests and responses.
    #[serde(default)]
    pub algorithm: SignatureAlgorithm,

    /// Credential scheme prefixed to the `Authorization` header.
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// API host that relative paths are sent to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Reject response nonces already seen inside the skew window.
    #[serde(default)]
    pub replay_window_enabled: bool,
}

fn default_clock_skew() -> u64 {
    300 // 5 minutes
}

fn default_scheme() -> String {
    DEFAULT_SCHEME.to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            clock_skew_tolerance_secs: default_clock_skew(),
            algorithm: SignatureAlgorithm::default(),
            scheme: default_scheme(),
            base_url: default_base_url(),
            replay_window_enabled: false,
        }
    }
}

impl ClientConfig {
    /// Set the clock-skew tolerance.
    pub fn with_clock_skew_tolerance(mut self, secs: u64) -> Self {
        self.clock_skew_tolerance_secs = secs;
        self
    }

    /// Set the signature algorithm.
    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set the credential scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Enable or disable the response nonce replay cache.
    pub fn with_replay_window(mut self, enabled: bool) -> Self {
        self.replay_window_enabled = enabled;
        self
    }

    /// Defaults overlaid with `PAYSIGN_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each variable
    /// name in [`env`]. Unset variables keep their default; unparsable ones
    /// are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(env::CLOCK_SKEW_SECS) {
            config.clock_skew_tolerance_secs = parse_u64(env::CLOCK_SKEW_SECS, &value)?;
        }
        if let Some(value) = lookup(env::ALGORITHM) {
            config.algorithm = value
                .parse::<SignatureAlgorithm>()
                .map_err(|reason: String| ConfigError::new(env::ALGORITHM, reason))?;
        }
        if let Some(value) = lookup(env::SCHEME) {
            config.scheme = value.trim().to_string();
        }
        if let Some(value) = lookup(env::BASE_URL) {
            config.base_url = value.trim().to_string();
        }
        if let Some(value) = lookup(env::REPLAY_CACHE) {
            config.replay_window_enabled = parse_bool(env::REPLAY_CACHE, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the crate relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_skew_tolerance_secs == 0 {
            return Err(ConfigError::new(
                "clock_skew_tolerance_secs",
                "must be greater than zero",
            ));
        }
        if self.scheme.is_empty() || self.scheme.chars().any(|c| c.is_whitespace()) {
            return Err(ConfigError::new(
                "scheme",
                "must be a non-empty token without whitespace",
            ));
        }
        if !(self.base_url.starts_with("https://") || self.base_url.starts_with("http://")) {
            return Err(ConfigError::new("base_url", "must be an http(s) URL"));
        }
        Ok(())
    }
}

fn parse_u64(field: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::new(field, format!("'{value}' is not a number: {e}")))
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::new(field, format!("'{value}' is not a boolean"))),
    }
}
