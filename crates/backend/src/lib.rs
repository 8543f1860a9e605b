pub mod bus;
pub mod capability;
pub mod dirs;
pub mod domain;
pub mod search;
pub mod worker;

pub use taskbus_core::config;

mod daemon;
pub use daemon::{Daemon, DaemonReport, PublishRequest, RuntimeConfig};

#[cfg(test)]
mod __tests__;
