//! Configuration for a pulse deployment.
//!
//! Loaded from `PULSE_*` environment variables on top of sensible defaults, then validated.
//!
//! # Example
//!
//! ```no_run
//! use pulse_runtime::config::PulseConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PulseConfig::from_env()?;
//! println!("API listening on {}", config.api.addr);
//! # Ok(())
//! # }
//! ```

use crate::event_bus::DEFAULT_BUS_CAPACITY;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held an unparsable value
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// Variable name
        var: String,
        /// Parse error
        reason: String,
    },
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Runtime loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Events buffered per bus subscriber
    pub bus_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl HttpConfig {
    /// Get timeout as Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Polling driver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval (ms) treated as the default; polls at this interval stop on any stop event
    pub default_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 1000,
        }
    }
}

/// HTTP facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Listen address for the state/warmup API
    pub addr: SocketAddr,
    /// Whether to install the Prometheus recorder and expose `/metrics`
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            metrics_enabled: false,
        }
    }
}

/// Aggregation module configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Base URL of the price adapters (`{base}/{source}/call`)
    pub adapter_base_url: String,
    /// Price sources to poll
    pub sources: Vec<String>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            adapter_base_url: "https://adapters.staging.org.devnet.tools".to_string(),
            sources: vec![
                "coingecko".to_string(),
                "coinmarketcap".to_string(),
                "coinapi".to_string(),
            ],
        }
    }
}

/// Complete deployment configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    /// Runtime loop configuration
    pub runtime: RuntimeConfig,
    /// Outbound HTTP configuration
    pub http: HttpConfig,
    /// Polling driver configuration
    pub polling: PollingConfig,
    /// HTTP facade configuration
    pub api: ApiConfig,
    /// Aggregation module configuration
    pub modules: ModulesConfig,
}

impl PulseConfig {
    /// Load configuration from `PULSE_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result is invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration using an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or the result is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parsed(&lookup, "PULSE_BUS_CAPACITY")? {
            config.runtime.bus_capacity = v;
        }
        if let Some(v) = parsed(&lookup, "PULSE_HTTP_TIMEOUT_SECS")? {
            config.http.timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "PULSE_DEFAULT_POLL_INTERVAL_MS")? {
            config.polling.default_interval_ms = v;
        }
        if let Some(v) = parsed(&lookup, "PULSE_API_ADDR")? {
            config.api.addr = v;
        }
        if let Some(v) = parsed(&lookup, "PULSE_METRICS_ENABLED")? {
            config.api.metrics_enabled = v;
        }
        if let Some(url) = lookup("PULSE_ADAPTER_BASE_URL") {
            config.modules.adapter_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(sources) = lookup("PULSE_SOURCES") {
            config.modules.sources = sources
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the whole configuration.
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.bus_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "bus_capacity must be > 0".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "http timeout_secs must be > 0".to_string(),
            ));
        }
        if self.polling.default_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "default_interval_ms must be > 0".to_string(),
            ));
        }
        if !self.modules.adapter_base_url.starts_with("http://")
            && !self.modules.adapter_base_url.starts_with("https://")
        {
            return Err(ConfigError::ValidationError(format!(
                "adapter_base_url must be http(s): {}",
                self.modules.adapter_base_url
            )));
        }
        Ok(())
    }
}

fn parsed<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var: var.to_string(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
