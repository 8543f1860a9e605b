//! Logging setup for CLI commands

use taskbus::{config::DaemonConfig, dirs};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Parse log level from config string
fn parse_log_level(level: &str) -> tracing::Level {
  match level.to_lowercase().as_str() {
    "off" | "error" => tracing::Level::ERROR,
    "warn" => tracing::Level::WARN,
    "info" => tracing::Level::INFO,
    "debug" => tracing::Level::DEBUG,
    "trace" => tracing::Level::TRACE,
    _ => tracing::Level::INFO,
  }
}

/// Initialize logging from the `[daemon]` config section.
///
/// Logs go to stderr unless `log_to_file` is set, in which case they go to a
/// rolling file under the data directory. `RUST_LOG` overrides the level.
///
/// Returns the guard that must be kept alive for the duration of the program
pub fn init_logging(config: &DaemonConfig) -> Option<WorkerGuard> {
  let level = parse_log_level(&config.log_level);
  let env_filter = EnvFilter::builder()
    .with_default_directive(level.into())
    .from_env_lossy();

  if !config.log_to_file {
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_target(true)
      .with_writer(std::io::stderr)
      .init();
    return None;
  }

  let log_dir = dirs::default_log_dir();
  if let Err(e) = std::fs::create_dir_all(&log_dir) {
    // Fall back to console-only logging
    tracing_subscriber::fmt()
      .with_env_filter(env_filter)
      .with_writer(std::io::stderr)
      .init();
    tracing::warn!(dir = ?log_dir, error = %e, "Cannot create log directory, logging to stderr");
    return None;
  }

  let file_appender = match config.log_rotation.as_str() {
    "hourly" => tracing_appender::rolling::hourly(&log_dir, "taskbus.log"),
    "never" => tracing_appender::rolling::never(&log_dir, "taskbus.log"),
    _ => tracing_appender::rolling::daily(&log_dir, "taskbus.log"),
  };
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::fmt()
    .with_env_filter(env_filter)
    .with_target(true)
    .with_ansi(false)
    .with_writer(file_writer)
    .init();

  Some(guard)
}
