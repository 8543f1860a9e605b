//! Composition root: owns the bus, the store and the standing workers.
//!
//! # Architecture
//!
//! ```text
//! Daemon
//!   ├── EventBus ──(Topic::Tasks)──┬──▶ SearchWorker ──▶ IndexWriter ──▶ SearchStore
//!   │                              └──▶ NotificationWorker ──▶ Notifier
//!   │                                                     └─▶ FileDeadLetterQueue (failures)
//!   ├── TaskRegistry
//!   └── TaskTracker (one task per worker)
//! ```
//!
//! # Lifecycle
//!
//! 1. Create master `CancellationToken` and the bus
//! 2. Subscribe each worker before anything can publish
//! 3. Spawn workers on the `TaskTracker`
//! 4. Publishers use [`Daemon::publish`] or a clone of [`Daemon::bus`]
//! 5. Shutdown: close the bus so workers drain, cancel if draining times
//!    out, wait for the search worker, and give the notification worker one
//!    more timeout window before aborting it

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{info, warn};

use crate::{
  bus::{BusError, BusStats, EventBus, PublishReport, Topic},
  capability::TaskRegistry,
  config::Config,
  dirs,
  domain::{EventData, Outcome, TaskEvent},
  search::{IndexWriter, ResolveRetry, SearchStore},
  worker::{FileDeadLetterQueue, NotificationWorker, Notifier, NotifyStats, SearchWorker, WorkerStats},
};

// ============================================================================
// Configuration
// ============================================================================

/// Daemon runtime configuration.
///
/// The loaded config plus the paths derived from it.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
  /// Base directory for data (snapshot, logs)
  pub data_dir: PathBuf,
  /// Index snapshot file
  pub snapshot_path: PathBuf,
  /// Undeliverable notices
  pub dead_letter_path: PathBuf,
  pub config: Config,
}

impl RuntimeConfig {
  /// Load the config that applies to `dir`.
  pub fn load(dir: &Path) -> Self {
    Self::from_config(Config::load_for_dir(dir))
  }

  pub fn from_config(config: Config) -> Self {
    Self {
      data_dir: dirs::default_data_dir(),
      snapshot_path: dirs::snapshot_path(&config),
      dead_letter_path: dirs::dead_letter_path(&config),
      config,
    }
  }

  pub fn shutdown_timeout(&self) -> Duration {
    Duration::from_millis(self.config.bus.shutdown_timeout_ms)
  }
}

// ============================================================================
// Publish requests
// ============================================================================

/// A task event described by name, as it arrives from outside the process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
  pub task: String,
  pub path: String,
  pub user_id: i32,
  pub outcome: Outcome,
  pub data: EventData,
}

impl PublishRequest {
  /// Resolve the task name. Unknown names become the missing-task placeholder.
  pub fn into_event(self, registry: &TaskRegistry) -> TaskEvent {
    TaskEvent::new(registry.resolve(&self.task), self.outcome, self.data)
      .with_path(self.path)
      .with_user(self.user_id)
  }
}

// ============================================================================
// Daemon
// ============================================================================

/// What the workers did over the daemon's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DaemonReport {
  pub search: WorkerStats,
  pub notify: Option<NotifyStats>,
  pub bus: BusStats,
  /// Every delivery was acknowledged before the shutdown timeout
  pub drained: bool,
}

pub struct Daemon {
  runtime_config: RuntimeConfig,
  bus: EventBus,
  store: Arc<dyn SearchStore>,
  registry: Arc<TaskRegistry>,
  cancel: CancellationToken,
  tracker: TaskTracker,
  search_handle: JoinHandle<WorkerStats>,
  notify_handle: Option<JoinHandle<NotifyStats>>,
}

impl Daemon {
  /// Build the bus, subscribe the workers and spawn them.
  ///
  /// Must be called inside a tokio runtime.
  pub fn start(
    runtime_config: RuntimeConfig,
    store: Arc<dyn SearchStore>,
    notifier: Arc<dyn Notifier>,
    registry: Arc<TaskRegistry>,
  ) -> Result<Self, BusError> {
    let config = &runtime_config.config;
    let cancel = CancellationToken::new();
    let tracker = TaskTracker::new();
    let bus = EventBus::new(&config.bus);

    let writer = IndexWriter::new(Arc::clone(&store), ResolveRetry::from_config(&config.search));
    let search_worker = SearchWorker::new(writer, &config.worker);
    let search_subscription = bus.subscribe(Topic::Tasks)?;
    let search_handle = tracker.spawn(search_worker.run(search_subscription, cancel.child_token()));

    let notify_handle = if config.worker.notifications_enabled {
      let dead_letters = Arc::new(FileDeadLetterQueue::new(runtime_config.dead_letter_path.clone()));
      let worker = NotificationWorker::new(notifier, config.notifications.clone()).with_dead_letters(dead_letters);
      let subscription = bus.subscribe(Topic::Tasks)?;
      Some(tracker.spawn(worker.run(subscription, cancel.child_token())))
    } else {
      info!("Notification worker disabled");
      None
    };

    info!(
      channel_capacity = config.bus.channel_capacity,
      tasks = registry.len(),
      notifications = notify_handle.is_some(),
      "Daemon started"
    );

    Ok(Self {
      runtime_config,
      bus,
      store,
      registry,
      cancel,
      tracker,
      search_handle,
      notify_handle,
    })
  }

  /// Handle for publishers. Clones share the same bus.
  pub fn bus(&self) -> &EventBus {
    &self.bus
  }

  pub fn store(&self) -> &Arc<dyn SearchStore> {
    &self.store
  }

  pub fn registry(&self) -> &TaskRegistry {
    &self.registry
  }

  pub fn runtime_config(&self) -> &RuntimeConfig {
    &self.runtime_config
  }

  /// Token cancelled when the daemon stops; children may be handed to
  /// anything whose lifetime should end with the daemon.
  pub fn cancel_token(&self) -> CancellationToken {
    self.cancel.clone()
  }

  pub fn publish(&self, event: TaskEvent) -> Result<PublishReport, BusError> {
    self.bus.publish(event)
  }

  pub fn publish_request(&self, request: PublishRequest) -> Result<PublishReport, BusError> {
    self.publish(request.into_event(&self.registry))
  }

  /// Stop the daemon, letting workers finish what was already delivered.
  pub async fn shutdown(self) -> DaemonReport {
    let timeout = self.runtime_config.shutdown_timeout();
    info!(timeout_ms = timeout.as_millis() as u64, "Shutting down...");

    let mut drained = match self.bus.shutdown(timeout).await {
      Ok(()) => true,
      Err(e) => {
        warn!(error = %e, "Bus did not drain in time, cancelling workers");
        false
      }
    };

    self.cancel.cancel();
    self.tracker.close();

    // An index pass in progress always runs to completion.
    let search = match self.search_handle.await {
      Ok(stats) => stats,
      Err(e) => {
        warn!(error = %e, "Search worker task failed");
        WorkerStats::default()
      }
    };

    // A delivery may never return, so the notifier gets one more timeout
    // window and is then aborted.
    let notify = match self.notify_handle {
      Some(mut handle) => match tokio::time::timeout(timeout, &mut handle).await {
        Ok(Ok(stats)) => Some(stats),
        Ok(Err(e)) => {
          warn!(error = %e, "Notification worker task failed");
          None
        }
        Err(_) => {
          warn!(
            timeout_ms = timeout.as_millis() as u64,
            "Notification worker did not stop, aborting"
          );
          handle.abort();
          drained = false;
          None
        }
      },
      None => None,
    };

    self.tracker.wait().await;

    let report = DaemonReport {
      search,
      notify,
      bus: self.bus.stats(),
      drained,
    };
    info!(
      published = report.bus.published,
      indexed = report.search.indexed,
      drained,
      "Daemon shutdown complete"
    );
    report
  }
}
