//! Configuration system for taskbus with per-directory overrides.
//!
//! Config priority: directory-relative (.taskbus/taskbus.toml) > user (~/.config/taskbus/config.toml) > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Parse error: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("Serialize error: {0}")]
  Serialize(#[from] toml::ser::Error),
}

// ============================================================================
// Bus Configuration
// ============================================================================

/// Event bus tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
  /// Buffered deliveries per subscriber before new messages are dropped for it (default: 64)
  pub channel_capacity: usize,

  /// How long shutdown waits for outstanding deliveries to be acknowledged (default: 5000)
  pub shutdown_timeout_ms: u64,
}

impl Default for BusConfig {
  fn default() -> Self {
    Self {
      channel_capacity: 64,
      shutdown_timeout_ms: 5000,
    }
  }
}

// ============================================================================
// Search Configuration
// ============================================================================

/// Search index settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
  /// Re-fetch attempts after a lost word insert race (default: 3)
  pub resolve_retries: u32,

  /// Base backoff between re-fetch attempts in milliseconds (default: 5)
  pub resolve_backoff_ms: u64,

  /// Where the index snapshot lives. Defaults to `<data_dir>/index.json` when unset.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub snapshot_path: Option<PathBuf>,
}

impl Default for SearchConfig {
  fn default() -> Self {
    Self {
      resolve_retries: 3,
      resolve_backoff_ms: 5,
      snapshot_path: None,
    }
  }
}

// ============================================================================
// Worker Configuration
// ============================================================================

/// Standing consumer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
  /// Index events whose action failed (default: false)
  pub index_failed_outcomes: bool,

  /// Start the notification worker next to the search worker (default: true)
  pub notifications_enabled: bool,
}

impl Default for WorkerConfig {
  fn default() -> Self {
    Self {
      index_failed_outcomes: false,
      notifications_enabled: true,
    }
  }
}

// ============================================================================
// Notification Configuration
// ============================================================================

/// Notification fan-out settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
  /// Send admin notices at all (default: true)
  pub admin_enabled: bool,

  /// Addresses that receive admin notices
  pub admin_emails: Vec<String>,

  /// Where undeliverable notices are kept (default: <data_dir>/dead-letters.jsonl)
  pub dead_letter_path: Option<PathBuf>,
}

impl Default for NotificationsConfig {
  fn default() -> Self {
    Self {
      admin_enabled: true,
      admin_emails: Vec::new(),
      dead_letter_path: None,
    }
  }
}

// ============================================================================
// Daemon Configuration
// ============================================================================

/// Daemon lifecycle configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
  /// Log level: "off", "error", "warn", "info", "debug", "trace"
  /// Default: "info"
  #[serde(default = "default_log_level")]
  pub log_level: String,

  /// Log file rotation: "daily", "hourly", "never"
  /// Default: "daily"
  #[serde(default = "default_log_rotation")]
  pub log_rotation: String,

  /// Write logs to `<data_dir>/logs` instead of stderr
  /// Default: false
  pub log_to_file: bool,
}

fn default_log_level() -> String {
  "info".to_string()
}
fn default_log_rotation() -> String {
  "daily".to_string()
}

impl Default for DaemonConfig {
  fn default() -> Self {
    Self {
      log_level: default_log_level(),
      log_rotation: default_log_rotation(),
      log_to_file: false,
    }
  }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// taskbus configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Event bus settings
  #[serde(default)]
  pub bus: BusConfig,

  /// Search index settings
  #[serde(default)]
  pub search: SearchConfig,

  /// Worker settings
  #[serde(default)]
  pub worker: WorkerConfig,

  /// Notification settings
  #[serde(default)]
  pub notifications: NotificationsConfig,

  /// Daemon lifecycle settings
  #[serde(default)]
  pub daemon: DaemonConfig,
}

impl Config {
  /// Load config for a directory, with fallback to user config
  pub fn load_for_dir(dir: &Path) -> Self {
    let local_config = Self::dir_config_path(dir);
    if local_config.exists()
      && let Ok(config) = Self::load_from_path(&local_config)
    {
      return config;
    }

    if let Some(user_config_path) = Self::user_config_path()
      && user_config_path.exists()
      && let Ok(config) = Self::load_from_path(&user_config_path)
    {
      return config;
    }

    Self::default()
  }

  /// Load a specific file, surfacing read and parse failures
  pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
  }

  /// Write this config as TOML, creating parent directories
  pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(self)?)?;
    Ok(())
  }

  /// Get the user-level config path
  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }

    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("taskbus").join("config.toml"));
    }

    dirs::config_dir().map(|p: PathBuf| p.join("taskbus").join("config.toml"))
  }

  /// Get the directory-relative config path
  pub fn dir_config_path(dir: &Path) -> PathBuf {
    dir.join(".taskbus").join("taskbus.toml")
  }

  /// Generate a default config file as a string
  pub fn generate_template() -> String {
    let defaults = Self::default();
    format!(
      r#"# taskbus Configuration
# Place in .taskbus/taskbus.toml (directory) or ~/.config/taskbus/config.toml (user)

# ============================================================================
# Event Bus
# ============================================================================

[bus]
# Buffered deliveries per subscriber. When a subscriber's buffer is full,
# new messages are dropped for that subscriber only.
channel_capacity = {channel_capacity}

# How long shutdown waits for in-flight deliveries (milliseconds)
shutdown_timeout_ms = {shutdown_timeout_ms}

# ============================================================================
# Search Index
# ============================================================================

[search]
# Re-fetch attempts when a word insert loses a race
resolve_retries = {resolve_retries}

# Base backoff between attempts (milliseconds)
resolve_backoff_ms = {resolve_backoff_ms}

# Index snapshot location (default: <data_dir>/index.json)
# snapshot_path = "/var/lib/taskbus/index.json"

# ============================================================================
# Workers
# ============================================================================

[worker]
# Index events whose action reported failure
index_failed_outcomes = {index_failed_outcomes}

# Run the notification worker
notifications_enabled = {notifications_enabled}

# ============================================================================
# Notifications
# ============================================================================

[notifications]
# Send admin notices
admin_enabled = {admin_enabled}

# Admin notice recipients
# admin_emails = ["admin@example.com"]

# Undeliverable notices, one JSON object per line (default: <data_dir>/dead-letters.jsonl)
# dead_letter_path = "/var/lib/taskbus/dead-letters.jsonl"

# ============================================================================
# Daemon Lifecycle
# ============================================================================

[daemon]
# Log level: off, error, warn, info, debug, trace
# Default: info
log_level = "{log_level}"

# Log rotation: daily, hourly, never
# Default: daily
log_rotation = "{log_rotation}"

# Write logs to <data_dir>/logs instead of stderr
log_to_file = {log_to_file}
"#,
      channel_capacity = defaults.bus.channel_capacity,
      shutdown_timeout_ms = defaults.bus.shutdown_timeout_ms,
      resolve_retries = defaults.search.resolve_retries,
      resolve_backoff_ms = defaults.search.resolve_backoff_ms,
      index_failed_outcomes = defaults.worker.index_failed_outcomes,
      notifications_enabled = defaults.worker.notifications_enabled,
      admin_enabled = defaults.notifications.admin_enabled,
      log_level = defaults.daemon.log_level,
      log_rotation = defaults.daemon.log_rotation,
      log_to_file = defaults.daemon.log_to_file,
    )
  }
}
