use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::next_delivery;
use crate::{
  bus::Subscription,
  config::WorkerConfig,
  domain::{IndexEventData, IndexPayload, TaskEvent},
  search::IndexWriter,
};

/// Counters accumulated over a search worker's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
  pub events: u64,
  pub instructions: u64,
  pub indexed: u64,
  pub skipped: u64,
  pub failed: u64,
  pub panics: u64,
}

impl WorkerStats {
  fn absorb(&mut self, tally: WorkerStats) {
    self.instructions += tally.instructions;
    self.indexed += tally.indexed;
    self.skipped += tally.skipped;
    self.failed += tally.failed;
  }
}

/// Keeps the search index in step with published task events.
pub struct SearchWorker {
  writer: IndexWriter,
  index_failed_outcomes: bool,
}

impl SearchWorker {
  pub fn new(writer: IndexWriter, config: &WorkerConfig) -> Self {
    Self {
      writer,
      index_failed_outcomes: config.index_failed_outcomes,
    }
  }

  /// Consume task events until the subscription closes or `cancel` fires.
  pub async fn run(self, mut subscription: Subscription, cancel: CancellationToken) -> WorkerStats {
    info!(subscriber = subscription.id(), "Search worker started");
    let mut stats = WorkerStats::default();

    while let Some(delivery) = next_delivery("search", &mut subscription, &cancel).await {
      let Some(event) = delivery.as_task() else {
        continue;
      };
      stats.events += 1;

      match AssertUnwindSafe(self.handle_event(event)).catch_unwind().await {
        Ok(tally) => stats.absorb(tally),
        Err(_) => {
          stats.panics += 1;
          error!(event_id = %event.id, task = %event.task_name(), "Search indexing panicked, skipping event");
        }
      }
    }

    info!(
      events = stats.events,
      indexed = stats.indexed,
      failed = stats.failed,
      panics = stats.panics,
      "Search worker stopped"
    );
    stats
  }

  /// Index everything one event asks for. Errors are logged per instruction
  /// and never stop the remaining ones.
  pub async fn handle_event(&self, event: &TaskEvent) -> WorkerStats {
    let mut tally = WorkerStats::default();

    if !event.outcome.is_success() && !self.index_failed_outcomes {
      trace!(event_id = %event.id, task = %event.task_name(), "Skipping failed action");
      return tally;
    }

    let indexing = event.task.indexing();
    let instructions: Vec<IndexEventData> = match (&event.data.index, indexing) {
      (Some(IndexPayload::Single(item)), _) => vec![item.clone()],
      (_, Some(capability)) => capability.index_data(&event.data),
      (_, None) => return tally,
    };
    let fallback_type = indexing.map(|capability| capability.index_type());

    for item in instructions {
      tally.instructions += 1;
      let item = match fallback_type {
        Some(ty) => item.with_default_type(ty),
        None => item,
      };

      let entity_type = match item.entity_type {
        Some(ty) if item.is_indexable() => ty,
        _ => {
          tally.skipped += 1;
          trace!(event_id = %event.id, entity_id = item.id, "Nothing indexable in instruction");
          continue;
        }
      };

      match self.writer.index_text(entity_type, item.id, &item.text).await {
        Ok(outcome) => {
          tally.indexed += 1;
          debug!(
            event_id = %event.id,
            task = %event.task_name(),
            entity_type = %entity_type,
            entity_id = item.id,
            words = outcome.words,
            "Indexed"
          );
        }
        Err(e) => {
          tally.failed += 1;
          error!(
            event_id = %event.id,
            task = %event.task_name(),
            entity_type = %entity_type,
            entity_id = item.id,
            error = %e,
            "Failed to index entity"
          );
        }
      }
    }

    tally
  }
}
