//! Commands that feed the pipeline (tokenize, publish, replay)

use std::{collections::BTreeMap, path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::Args;
use taskbus::{
  Daemon, DaemonReport, PublishRequest, RuntimeConfig,
  capability::TaskRegistry,
  domain::{EventData, IndexEventData, IndexPayload, Outcome, TaskEvent},
  search::tokenize,
  worker::TracingNotifier,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use super::{open_store, parse_entity_type, save_store};

/// Print the frequency map of `text`, sorted by word
pub fn cmd_tokenize(text: &str, json: bool) -> Result<()> {
  let counts: BTreeMap<String, u32> = tokenize(text).into_iter().collect();

  if json {
    println!("{}", serde_json::to_string_pretty(&counts)?);
    return Ok(());
  }

  if counts.is_empty() {
    println!("No words.");
    return Ok(());
  }
  for (word, count) in &counts {
    println!("{:<24} {}", word, count);
  }
  Ok(())
}

#[derive(Args, Debug)]
pub struct PublishArgs {
  /// Task name, e.g. writing.submit (see `taskbus tasks`)
  pub task: String,
  /// Entity type for --id/--text (default: the task's own index type)
  #[arg(short = 't', long = "type")]
  pub entity_type: Option<String>,
  #[arg(long)]
  pub id: Option<i64>,
  #[arg(long)]
  pub text: Option<String>,
  /// JSON array of index instructions, published as a bulk payload
  #[arg(long, value_name = "FILE", conflicts_with_all = ["id", "text"])]
  pub bulk: Option<std::path::PathBuf>,
  /// Request path the event came from
  #[arg(long, default_value = "/")]
  pub path: String,
  /// Acting user id
  #[arg(long, default_value = "0")]
  pub user: i32,
  /// Users to notify directly (repeatable)
  #[arg(long = "target")]
  pub targets: Vec<i32>,
  /// Mark the action as failed
  #[arg(long)]
  pub failure: bool,
}

impl PublishArgs {
  async fn payload(&self) -> Result<Option<IndexPayload>> {
    if let Some(file) = &self.bulk {
      let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {:?}", file))?;
      let items: Vec<IndexEventData> = serde_json::from_str(&raw).context("Bulk file must be a JSON array")?;
      return Ok(Some(IndexPayload::Bulk(items)));
    }

    match (self.id, &self.text) {
      (Some(id), Some(text)) => {
        let entity_type = self.entity_type.as_deref().map(parse_entity_type).transpose()?;
        Ok(Some(IndexPayload::Single(IndexEventData {
          entity_type,
          id,
          text: text.clone(),
        })))
      }
      (None, None) => Ok(None),
      _ => bail!("--id and --text must be given together"),
    }
  }
}

/// Publish one event, wait for the workers to drain, then save the index
pub async fn cmd_publish(runtime_config: &RuntimeConfig, args: PublishArgs) -> Result<()> {
  let registry = Arc::new(TaskRegistry::with_catalog());
  let Some(task) = registry.get(&args.task) else {
    bail!("Unknown task: {} (see `taskbus tasks`)", args.task);
  };

  let mut data = EventData::default().with_targets(args.targets.iter().copied());
  data.index = args.payload().await?;
  let outcome = if args.failure { Outcome::Failure } else { Outcome::Success };
  let event = TaskEvent::new(task, outcome, data)
    .with_path(args.path.clone())
    .with_user(args.user);
  let event_id = event.id;

  let store = open_store(runtime_config).await?;
  let daemon = Daemon::start(
    runtime_config.clone(),
    store.clone(),
    Arc::new(TracingNotifier),
    registry,
  )?;
  let published = daemon.publish(event)?;
  let report = daemon.shutdown().await;
  save_store(runtime_config, &store).await?;

  println!("Published {} ({})", args.task, event_id);
  println!("  Subscribers:  {}", published.delivered);
  print_report(&report);
  Ok(())
}

/// Publish every event in a JSON Lines file. Ctrl-C stops reading; events
/// already published are still processed.
pub async fn cmd_replay(runtime_config: &RuntimeConfig, file: &Path) -> Result<()> {
  let input = tokio::fs::File::open(file)
    .await
    .with_context(|| format!("Failed to open {:?}", file))?;
  let mut lines = BufReader::new(input).lines();

  let store = open_store(runtime_config).await?;
  let daemon = Daemon::start(
    runtime_config.clone(),
    store.clone(),
    Arc::new(TracingNotifier),
    Arc::new(TaskRegistry::with_catalog()),
  )?;

  let (mut published, mut rejected, mut line_no) = (0u64, 0u64, 0u64);
  loop {
    let line = tokio::select! {
      _ = tokio::signal::ctrl_c() => {
        warn!("Interrupted, stopping replay");
        break;
      }
      line = lines.next_line() => line?,
    };
    let Some(line) = line else { break };
    line_no += 1;
    if line.trim().is_empty() {
      continue;
    }

    let request: PublishRequest = match serde_json::from_str(&line) {
      Ok(request) => request,
      Err(e) => {
        rejected += 1;
        error!(line = line_no, error = %e, "Invalid event, skipping");
        continue;
      }
    };

    if let Err(e) = daemon.publish_request(request) {
      error!(line = line_no, error = %e, "Publish failed, stopping replay");
      break;
    }
    published += 1;
  }

  info!(published, rejected, "Replay finished, draining");
  let report = daemon.shutdown().await;
  save_store(runtime_config, &store).await?;

  println!("Replayed {} event(s) from {:?}", published, file);
  if rejected > 0 {
    println!("  Rejected:     {}", rejected);
  }
  print_report(&report);
  Ok(())
}

fn print_report(report: &DaemonReport) {
  println!("  Indexed:      {}", report.search.indexed);
  println!("  Skipped:      {}", report.search.skipped);
  println!("  Failed:       {}", report.search.failed);
  if let Some(notify) = report.notify {
    println!("  Notices:      {} sent, {} failed", notify.delivered, notify.failed);
  }
  if report.bus.dropped > 0 {
    println!("  Dropped:      {} (subscriber buffer full)", report.bus.dropped);
  }
  if !report.drained {
    println!("  Warning: shutdown timed out before every event was processed");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use taskbus::domain::EntityType;

  fn args(task: &str) -> PublishArgs {
    PublishArgs {
      task: task.to_string(),
      entity_type: None,
      id: None,
      text: None,
      bulk: None,
      path: "/".into(),
      user: 0,
      targets: Vec::new(),
      failure: false,
    }
  }

  #[tokio::test]
  async fn test_single_payload_from_flags() {
    let mut a = args("writing.submit");
    a.entity_type = Some("Writing".into());
    a.id = Some(4);
    a.text = Some("hello".into());
    assert_eq!(
      a.payload().await.unwrap(),
      Some(IndexPayload::Single(IndexEventData::new(EntityType::Writing, 4, "hello")))
    );
  }

  #[tokio::test]
  async fn test_id_without_text_is_rejected() {
    let mut a = args("writing.submit");
    a.id = Some(4);
    assert!(a.payload().await.is_err());
  }

  #[tokio::test]
  async fn test_bulk_payload_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("items.json");
    std::fs::write(&file, r#"[{"id": 1, "text": "a"}, {"type": "linker", "id": 2, "text": "b"}]"#).unwrap();

    let mut a = args("linker.bulk-approve");
    a.bulk = Some(file);
    let payload = a.payload().await.unwrap().unwrap();
    assert_eq!(payload.len(), 2);
    assert_eq!(payload.instructions()[0].entity_type, None);
    assert_eq!(payload.instructions()[1].entity_type, Some(EntityType::LinkerItem));
  }
}
