//! Configuration - type-safe, validated config

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Pre-trade risk limits
    #[serde(default)]
    pub risk: RiskLimits,

    /// Conditional order monitor pacing
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Trade journal retention
    #[serde(default)]
    pub journal: JournalConfig,

    /// Execution venue endpoint
    #[serde(default)]
    pub venue: VenueConfig,

    /// Notification system endpoint (optional)
    pub notifier: Option<NotifierConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Max notional value of a single order
    pub max_notional_per_order: f64,

    /// Max allowed deviation of an order's price from the reference price,
    /// as a fraction (0.10 = ±10%)
    pub collar_pct: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_notional_per_order: 250_000.0,
            collar_pct: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between trigger-evaluation passes
    pub poll_interval_ms: u64,

    /// Sleep after a whole-pass failure before resuming
    pub error_backoff_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            error_backoff_ms: 5_000,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Oldest entries are evicted past this cap
    pub max_entries: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { max_entries: 1_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue base URL, e.g. "http://exchange:8081"
    pub base_url: String,

    /// Callback address the venue posts execution reports to
    pub callback_url: String,

    /// Per-request timeout; expiry is terminal for the order
    pub timeout_secs: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: "http://exchange:8081".into(),
            callback_url: "http://broker:8000/exec".into(),
            timeout_secs: 10,
        }
    }
}

impl VenueConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Notification system base URL
    pub base_url: String,

    /// API key sent in the X-API-Key header
    pub api_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            risk: RiskLimits::default(),
            monitor: MonitorConfig::default(),
            journal: JournalConfig::default(),
            venue: VenueConfig::default(),
            notifier: None,
        }
    }
}

impl Config {
    /// Load from TOML file
    pub fn load(path: &Path) -> crate::core::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::core::Error::Config(format!("Failed to read config: {}", e))
        })?;

        toml::from_str(&content)
            .map_err(|e| crate::core::Error::Config(format!("Failed to parse config: {}", e)))
    }
}
