use std::path::PathBuf;

use crate::config::Config;

/// Get the default base path for taskbus data
///
/// Respects the following environment variables (in order of precedence):
/// 1. DATA_DIR - explicit data directory override
/// 2. XDG_DATA_HOME - standard XDG data home directory
/// 3. dirs::data_local_dir() - platform default
pub fn default_data_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("DATA_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
    return PathBuf::from(xdg_data).join("taskbus");
  }

  dirs::data_local_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("taskbus")
}

/// Get the default config directory
///
/// Respects the following environment variables (in order of precedence):
/// 1. CONFIG_DIR - explicit config directory override
/// 2. XDG_CONFIG_HOME - standard XDG config home directory
/// 3. dirs::config_dir() - platform default
pub fn default_config_dir() -> PathBuf {
  if let Ok(dir) = std::env::var("CONFIG_DIR") {
    return PathBuf::from(dir);
  }

  if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
    return PathBuf::from(xdg_config).join("taskbus");
  }

  dirs::config_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("taskbus")
}

/// Where log files go when file logging is on
pub fn default_log_dir() -> PathBuf {
  default_data_dir().join("logs")
}

/// Index snapshot location: the configured path, else `<data_dir>/index.json`
pub fn snapshot_path(config: &Config) -> PathBuf {
  config
    .search
    .snapshot_path
    .clone()
    .unwrap_or_else(|| default_data_dir().join("index.json"))
}

/// Dead-letter file: the configured path, else `<data_dir>/dead-letters.jsonl`
pub fn dead_letter_path(config: &Config) -> PathBuf {
  config
    .notifications
    .dead_letter_path
    .clone()
    .unwrap_or_else(|| default_data_dir().join("dead-letters.jsonl"))
}
