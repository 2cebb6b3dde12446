//! Runtime configuration, injected into each component at construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// Chain node endpoints.
///
/// Live subscriptions and synchronous calls may point at the same node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEndpoints {
    /// WebSocket endpoint for log subscriptions (`ws://` or `wss://`).
    pub ws_url: String,
    /// HTTP endpoint for `eth_call`.
    pub rpc_url: String,
}

/// Backoff settings for the subscription reconnect loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    /// First delay after a failed or empty session, in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Cap for the exponentially growing delay, in milliseconds.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    60_000
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl ReconnectConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

/// Top-level watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    pub chain: ChainEndpoints,
    /// Factory contract whose creation events are indexed.
    pub factory_address: String,
    /// Base URL of the judging / notification service.
    pub judge_base_url: String,
    /// Scheduler scan period in seconds.
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
    /// Timeout applied to every outbound HTTP request, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_scan_interval_secs() -> u64 {
    10
}
fn default_http_timeout_secs() -> u64 {
    30
}

impl WatchConfig {
    /// Load configuration from `BETINDEX_*` environment variables.
    ///
    /// Required: `BETINDEX_WS_URL`, `BETINDEX_RPC_URL`,
    /// `BETINDEX_FACTORY_ADDRESS`, `BETINDEX_JUDGE_URL`. The rest fall back
    /// to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            chain: ChainEndpoints {
                ws_url: require("BETINDEX_WS_URL")?,
                rpc_url: require("BETINDEX_RPC_URL")?,
            },
            factory_address: require("BETINDEX_FACTORY_ADDRESS")?.to_ascii_lowercase(),
            judge_base_url: require("BETINDEX_JUDGE_URL")?,
            scan_interval_secs: optional_u64("BETINDEX_SCAN_INTERVAL_SECS")?
                .unwrap_or_else(default_scan_interval_secs),
            http_timeout_secs: optional_u64("BETINDEX_HTTP_TIMEOUT_SECS")?
                .unwrap_or_else(default_http_timeout_secs),
            reconnect: ReconnectConfig {
                initial_backoff_ms: optional_u64("BETINDEX_RECONNECT_INITIAL_MS")?
                    .unwrap_or_else(default_initial_backoff_ms),
                max_backoff_ms: optional_u64("BETINDEX_RECONNECT_MAX_MS")?
                    .unwrap_or_else(default_max_backoff_ms),
            },
        })
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    std::env::var(var).map_err(|_| ConfigError::MissingVar(var))
}

fn optional_u64(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Err(_) => Ok(None),
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value: raw }),
    }
}
