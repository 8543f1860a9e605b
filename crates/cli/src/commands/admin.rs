//! Administrative commands (stats, clear, tasks, config)

use anyhow::{Context, Result, bail};
use taskbus::{
  RuntimeConfig,
  capability::TaskRegistry,
  config::Config,
  domain::EntityType,
  search::SearchStore,
};

use super::{current_dir, open_store, parse_entity_type, save_store};

/// Show index statistics
pub async fn cmd_stats(runtime_config: &RuntimeConfig, json: bool) -> Result<()> {
  let store = open_store(runtime_config).await?;
  let stats = store.stats().await.context("Failed to read index stats")?;

  if json {
    println!("{}", serde_json::to_string_pretty(&stats)?);
    return Ok(());
  }

  println!("taskbus Index Statistics");
  println!("========================\n");
  println!("Snapshot:       {:?}", runtime_config.snapshot_path);
  println!("Words:          {}", stats.words);
  println!("Associations:   {}", stats.total_associations());
  println!();
  println!("{:<12} {:>10} {:>14} {:>12}", "TYPE", "ENTITIES", "ASSOCIATIONS", "OCCURRENCES");
  for entity_type in EntityType::ALL {
    let s = stats.for_type(entity_type);
    println!(
      "{:<12} {:>10} {:>14} {:>12}",
      entity_type.as_str(),
      s.entities,
      s.associations,
      s.occurrences
    );
  }
  Ok(())
}

/// Drop one entity type from the index
pub async fn cmd_clear(runtime_config: &RuntimeConfig, entity_type: &str) -> Result<()> {
  let entity_type = parse_entity_type(entity_type)?;
  let store = open_store(runtime_config).await?;
  let report = store.clear_entity_type(entity_type).await?;
  save_store(runtime_config, &store).await?;

  println!(
    "Cleared {}: {} association(s), {} watermark(s)",
    entity_type, report.associations, report.watermarks
  );
  Ok(())
}

/// List registered task kinds
pub fn cmd_tasks() -> Result<()> {
  let registry = TaskRegistry::with_catalog();

  println!("{:<24} CAPABILITIES", "TASK");
  for (name, task) in registry.iter() {
    let index_type = task
      .indexing()
      .map(|capability| format!(" ({})", capability.index_type()))
      .unwrap_or_default();
    println!("{:<24} {}{}", name, task.capabilities(), index_type);
  }
  Ok(())
}

/// Show the effective configuration
pub fn cmd_config_show() -> Result<()> {
  let cwd = current_dir();
  let config = Config::load_for_dir(&cwd);

  let dir_config = Config::dir_config_path(&cwd);
  let user_config = Config::user_config_path();

  println!("Effective configuration for: {:?}", cwd);
  println!();

  if dir_config.exists() {
    println!("Using directory config: {:?}", dir_config);
  } else if let Some(ref user_path) = user_config
    && user_path.exists()
  {
    println!("Using user config: {:?}", user_path);
  } else {
    println!("Using default configuration (no config file found)");
  }
  println!();

  println!("{}", toml::to_string_pretty(&config)?);
  Ok(())
}

/// Write the config template for the current directory
pub fn cmd_config_init(force: bool) -> Result<()> {
  let config_path = Config::dir_config_path(&current_dir());

  if config_path.exists() && !force {
    bail!("Config file already exists: {:?} (use --force to overwrite)", config_path);
  }

  if let Some(parent) = config_path.parent() {
    std::fs::create_dir_all(parent)?;
  }
  std::fs::write(&config_path, Config::generate_template())?;

  println!("Created config: {:?}", config_path);
  println!("Edit the file to customize settings.");
  Ok(())
}
