pub mod config;

pub use config::{BusConfig, Config, ConfigError, DaemonConfig, NotificationsConfig, SearchConfig, WorkerConfig};
