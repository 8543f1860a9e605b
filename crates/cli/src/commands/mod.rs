//! CLI command implementations

mod admin;
mod index;
mod search;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use taskbus::{RuntimeConfig, domain::EntityType, search::MemoryStore};
use tracing::info;

pub use admin::{cmd_clear, cmd_config_init, cmd_config_show, cmd_stats, cmd_tasks};
pub use index::{PublishArgs, cmd_publish, cmd_replay, cmd_tokenize};
pub use search::{cmd_search, cmd_words};

fn current_dir() -> PathBuf {
  std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Effective config for the current directory
pub fn load_config() -> RuntimeConfig {
  RuntimeConfig::load(&current_dir())
}

async fn open_store(runtime_config: &RuntimeConfig) -> Result<Arc<MemoryStore>> {
  let store = MemoryStore::open(&runtime_config.snapshot_path)
    .await
    .with_context(|| format!("Failed to open index snapshot {:?}", runtime_config.snapshot_path))?;
  Ok(Arc::new(store))
}

async fn save_store(runtime_config: &RuntimeConfig, store: &MemoryStore) -> Result<()> {
  store
    .save_snapshot(&runtime_config.snapshot_path)
    .await
    .with_context(|| format!("Failed to save index snapshot {:?}", runtime_config.snapshot_path))?;
  info!(path = ?runtime_config.snapshot_path, "Index saved");
  Ok(())
}

fn parse_entity_type(value: &str) -> Result<EntityType> {
  value.parse::<EntityType>().with_context(|| {
    let known: Vec<&str> = EntityType::ALL.iter().map(|t| t.as_str()).collect();
    format!("Use one of: {}", known.join(", "))
  })
}
