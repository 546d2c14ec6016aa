use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::keys::budget::{DEFAULT_ABORT_LIMIT, DEFAULT_LOG_LIMIT};
use crate::keys::{LoaderLimits, MAX_KEY_ID};
use crate::types::{ConfigError, Result};

/// System configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_key_file")]
    pub file: PathBuf,
    /// Seconds between modification-time checks; 0 reloads only on SIGHUP
    #[serde(default)]
    pub reload_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_log_limit")]
    pub log_limit: u32,
    #[serde(default = "default_abort_limit")]
    pub abort_limit: u32,
    #[serde(default = "default_max_key_id")]
    pub max_key_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl SystemConfig {
    /// Load system configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = std::fs::read_to_string(&path)
            .map_err(|_| ConfigError::FileNotFound { path: path_str })?;

        let config: SystemConfig = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }
}

impl KeysConfig {
    /// Polling period, `None` when polling is disabled
    pub fn reload_period(&self) -> Option<Duration> {
        (self.reload_interval > 0).then(|| Duration::from_secs(self.reload_interval))
    }
}

impl From<&LimitsConfig> for LoaderLimits {
    fn from(limits: &LimitsConfig) -> Self {
        LoaderLimits {
            log_limit: limits.log_limit,
            abort_limit: limits.abort_limit,
            max_key_id: limits.max_key_id,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            file: default_key_file(),
            reload_interval: 0,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            log_limit: default_log_limit(),
            abort_limit: default_abort_limit(),
            max_key_id: default_max_key_id(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

// Default value functions
fn default_key_file() -> PathBuf {
    PathBuf::from("/etc/ntp.keys")
}

fn default_log_limit() -> u32 {
    DEFAULT_LOG_LIMIT
}

fn default_abort_limit() -> u32 {
    DEFAULT_ABORT_LIMIT
}

fn default_max_key_id() -> u32 {
    MAX_KEY_ID
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}
