//! Scheduler Configuration
//!
//! Tunables for the daemon, loadable from a YAML file and overridable by CLI
//! flags. A missing or unreadable file silently falls back to the defaults;
//! the strict loader is for callers that need the parse error.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default stability tolerance, in percentage points
pub const DEFAULT_TOLERANCE: u32 = 15;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum allowed swing in a domain's share between consecutive ticks
    /// (percentage points) before a rebalance is triggered
    pub tolerance: u32,
    /// Emit per-domain stat dumps and the per-CPU pinning table
    pub debug: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            debug: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Get config file path
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vcpusched")
        .join("config.yaml")
}

/// Load configuration from the default path, falling back to defaults if the
/// file is missing or unreadable.
pub fn load_config() -> SchedulerConfig {
    let path = config_path();
    if path.exists() {
        if let Ok(config) = load_config_from(&path) {
            return config;
        }
    }
    SchedulerConfig::default()
}

/// Load configuration from an explicit path, surfacing any failure.
pub fn load_config_from(path: &Path) -> ConfigResult<SchedulerConfig> {
    let content = std::fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}
