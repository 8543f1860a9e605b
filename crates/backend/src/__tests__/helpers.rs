//! Test helpers for pipeline integration tests.
//!
//! Provides `FaultyStore` for injecting store failures, `RecordingNotifier`
//! for capturing notices, and `DaemonTestContext` which starts a daemon over
//! an in-memory store with fast test settings.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
  time::Duration,
};

use async_trait::async_trait;

use crate::{
  Daemon, RuntimeConfig,
  capability::{Task, TaskRegistry},
  config::Config,
  domain::{EntityType, EventData, IndexEventData, IndexPayload, TaskEvent, Watermark, WordId},
  search::{ClearReport, IndexStats, MemoryStore, SearchStore, StoreError, WordCount, WordListQuery},
  worker::{Notice, Notifier, NotifyError},
};

// ============================================================================
// FaultyStore
// ============================================================================

/// What `FaultyStore` does when asked to create a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
  /// Backend error every time
  Fail,
  /// Insert the word, then report a conflict as if another writer won
  ConflictThenVisible,
  /// Report a conflict and never make the word visible
  ConflictForever,
}

/// A `MemoryStore` wrapper that fails on chosen words and can slow down
/// association writes.
pub struct FaultyStore {
  inner: Arc<MemoryStore>,
  faults: Mutex<HashMap<String, Fault>>,
  upsert_delay: Duration,
}

impl FaultyStore {
  pub fn new(inner: Arc<MemoryStore>) -> Self {
    Self {
      inner,
      faults: Mutex::new(HashMap::new()),
      upsert_delay: Duration::ZERO,
    }
  }

  pub fn with_upsert_delay(mut self, delay: Duration) -> Self {
    self.upsert_delay = delay;
    self
  }

  pub fn set_fault(&self, word: &str, fault: Fault) {
    self.faults.lock().unwrap().insert(word.to_string(), fault);
  }

  pub fn inner(&self) -> &Arc<MemoryStore> {
    &self.inner
  }

  fn fault_for(&self, word: &str) -> Option<Fault> {
    self.faults.lock().unwrap().get(word).copied()
  }
}

#[async_trait]
impl SearchStore for FaultyStore {
  async fn get_or_create_word(&self, word: &str) -> Result<WordId, StoreError> {
    match self.fault_for(word) {
      Some(Fault::Fail) => Err(StoreError::Backend(format!("injected failure for {word}"))),
      Some(Fault::ConflictThenVisible) => {
        self.inner.get_or_create_word(word).await?;
        Err(StoreError::Conflict(format!("lost race for {word}")))
      }
      Some(Fault::ConflictForever) => Err(StoreError::Conflict(format!("lost race for {word}"))),
      None => self.inner.get_or_create_word(word).await,
    }
  }

  async fn word_id(&self, word: &str) -> Result<Option<WordId>, StoreError> {
    self.inner.word_id(word).await
  }

  async fn upsert_association(
    &self,
    entity_type: EntityType,
    entity_id: i64,
    word: WordId,
    count: u32,
  ) -> Result<(), StoreError> {
    if !self.upsert_delay.is_zero() {
      tokio::time::sleep(self.upsert_delay).await;
    }
    self.inner.upsert_association(entity_type, entity_id, word, count).await
  }

  async fn prune_associations(&self, entity_type: EntityType, entity_id: i64, keep: &[WordId]) -> Result<usize, StoreError> {
    self.inner.prune_associations(entity_type, entity_id, keep).await
  }

  async fn set_last_indexed(&self, entity_type: EntityType, entity_id: i64, words: usize) -> Result<Watermark, StoreError> {
    self.inner.set_last_indexed(entity_type, entity_id, words).await
  }

  async fn last_indexed(&self, entity_type: EntityType, entity_id: i64) -> Result<Option<Watermark>, StoreError> {
    self.inner.last_indexed(entity_type, entity_id).await
  }

  async fn entities_with_word(&self, entity_type: EntityType, word: WordId) -> Result<Vec<i64>, StoreError> {
    self.inner.entities_with_word(entity_type, word).await
  }

  async fn word_list(&self, query: &WordListQuery) -> Result<Vec<WordCount>, StoreError> {
    self.inner.word_list(query).await
  }

  async fn count_words(&self, prefix: Option<&str>) -> Result<usize, StoreError> {
    self.inner.count_words(prefix).await
  }

  async fn stats(&self) -> Result<IndexStats, StoreError> {
    self.inner.stats().await
  }

  async fn clear_entity_type(&self, entity_type: EntityType) -> Result<ClearReport, StoreError> {
    self.inner.clear_entity_type(entity_type).await
  }
}

// ============================================================================
// RecordingNotifier
// ============================================================================

/// Keeps every notice it is handed.
#[derive(Default)]
pub struct RecordingNotifier {
  notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
  pub fn notices(&self) -> Vec<Notice> {
    self.notices.lock().unwrap().clone()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn deliver(&self, notice: Notice) -> Result<(), NotifyError> {
    self.notices.lock().unwrap().push(notice);
    Ok(())
  }
}

// ============================================================================
// Event builders
// ============================================================================

pub fn single_event(task: Arc<dyn Task>, entity_type: EntityType, id: i64, text: &str) -> TaskEvent {
  TaskEvent::success(
    task,
    EventData::default().with_index(IndexPayload::Single(IndexEventData::new(entity_type, id, text))),
  )
}

pub fn bulk_event(task: Arc<dyn Task>, items: &[(i64, &str)]) -> TaskEvent {
  let items = items
    .iter()
    .map(|(id, text)| IndexEventData {
      entity_type: None,
      id: *id,
      text: text.to_string(),
    })
    .collect();
  TaskEvent::success(task, EventData::default().with_index(IndexPayload::Bulk(items)))
}

// ============================================================================
// DaemonTestContext
// ============================================================================

/// A running daemon plus handles on its store and notifier.
pub struct DaemonTestContext {
  pub daemon: Daemon,
  pub store: Arc<MemoryStore>,
  pub notifier: Arc<RecordingNotifier>,
}

impl DaemonTestContext {
  /// Start a daemon with one admin address and a short shutdown timeout.
  pub fn start() -> Self {
    Self::start_with(test_config(), None)
  }

  /// Start with `config`. When `faulty` is given the daemon writes through
  /// it; `store` still points at the wrapped memory store.
  pub fn start_with(config: Config, faulty: Option<FaultyStore>) -> Self {
    let (store, daemon_store): (Arc<MemoryStore>, Arc<dyn SearchStore>) = match faulty {
      Some(faulty) => (faulty.inner().clone(), Arc::new(faulty)),
      None => {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
      }
    };
    let notifier = Arc::new(RecordingNotifier::default());

    let daemon = Daemon::start(
      RuntimeConfig::from_config(config),
      daemon_store,
      notifier.clone(),
      Arc::new(TaskRegistry::with_catalog()),
    )
    .expect("start daemon");

    Self {
      daemon,
      store,
      notifier,
    }
  }
}

pub fn test_config() -> Config {
  let mut config = Config::default();
  config.bus.shutdown_timeout_ms = 2_000;
  config.search.resolve_backoff_ms = 1;
  config.notifications.admin_emails = vec!["admin@example.com".into()];
  config.notifications.dead_letter_path = Some(std::env::temp_dir().join("taskbus-tests").join("dead-letters.jsonl"));
  config
}
