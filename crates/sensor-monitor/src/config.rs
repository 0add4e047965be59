//! Monitor configuration.
//!
//! Each field resolves independently, highest precedence first:
//! 1. Environment variable (`SENSOR_MONITOR_*`)
//! 2. TOML config file passed with `--config`
//! 3. Built-in default

use std::path::Path;
use std::time::Duration;

use acquisition::history::{ANOMALY_CAPACITY, DEFAULT_THRESHOLD, READING_CAPACITY};
use acquisition::{HistoryConfig, Threshold};
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

pub const ENV_URL: &str = "SENSOR_MONITOR_URL";
pub const ENV_INTERVAL_MS: &str = "SENSOR_MONITOR_INTERVAL_MS";
pub const ENV_CONNECT_TIMEOUT_SECS: &str = "SENSOR_MONITOR_CONNECT_TIMEOUT_SECS";
pub const ENV_THRESHOLD: &str = "SENSOR_MONITOR_THRESHOLD";

const DEFAULT_URL: &str = "http://localhost:8000";
const DEFAULT_INTERVAL_MS: u64 = 2000;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Config file contents. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub backend_url: Option<String>,
    pub interval_ms: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub threshold: Option<u32>,
    pub reading_capacity: Option<usize>,
    pub anomaly_capacity: Option<usize>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Resolved, validated monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitorConfig {
    /// Detection backend base URL.
    pub backend_url: String,
    /// Streaming cadence.
    pub interval_ms: u64,
    /// TCP connect timeout. No per-request timeout is applied.
    pub connect_timeout_secs: u64,
    /// Advisory threshold, `0..=100`.
    pub threshold: u32,
    pub reading_capacity: usize,
    pub anomaly_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_URL.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            threshold: u32::from(DEFAULT_THRESHOLD),
            reading_capacity: READING_CAPACITY,
            anomaly_capacity: ANOMALY_CAPACITY,
        }
    }
}

impl MonitorConfig {
    /// Load from the process environment and an optional config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => FileConfig::from_path(path)?,
            None => FileConfig::default(),
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Layer `env` over `file` over the defaults, then validate.
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            backend_url: env(ENV_URL)
                .or(file.backend_url)
                .unwrap_or(defaults.backend_url),
            interval_ms: parse_env(&env, ENV_INTERVAL_MS)?
                .or(file.interval_ms)
                .unwrap_or(defaults.interval_ms),
            connect_timeout_secs: parse_env(&env, ENV_CONNECT_TIMEOUT_SECS)?
                .or(file.connect_timeout_secs)
                .unwrap_or(defaults.connect_timeout_secs),
            threshold: parse_env(&env, ENV_THRESHOLD)?
                .or(file.threshold)
                .unwrap_or(defaults.threshold),
            reading_capacity: file.reading_capacity.unwrap_or(defaults.reading_capacity),
            anomaly_capacity: file.anomaly_capacity.unwrap_or(defaults.anomaly_capacity),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://"),
            "backend_url must be an http(s) URL, got '{}'",
            self.backend_url
        );
        ensure!(self.interval_ms > 0, "interval_ms must be greater than 0");
        ensure!(
            self.reading_capacity > 0 && self.anomaly_capacity > 0,
            "buffer capacities must be greater than 0"
        );
        Threshold::new(self.threshold).context("invalid threshold")?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn history_config(&self) -> Result<HistoryConfig> {
        Ok(HistoryConfig {
            reading_capacity: self.reading_capacity,
            anomaly_capacity: self.anomaly_capacity,
            threshold: Threshold::new(self.threshold).context("invalid threshold")?,
        })
    }
}

fn parse_env<T>(env: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key}='{raw}' is not a valid value"))
        })
        .transpose()
}
