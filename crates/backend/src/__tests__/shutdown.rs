//! Shutdown ordering: in-progress index passes finish, nothing is torn.

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use async_trait::async_trait;
  use pretty_assertions::assert_eq;

  use crate::{
    Daemon, RuntimeConfig,
    __tests__::helpers::{DaemonTestContext, FaultyStore, single_event, test_config},
    capability::{
      TaskRegistry,
      catalog::{LinkerApproveTask, WritingSubmitTask},
    },
    domain::EntityType,
    search::{MemoryStore, SearchStore},
    worker::{Notice, Notifier, NotifyError},
  };

  /// A transport that accepts a notice and never answers.
  struct HungNotifier;

  #[async_trait]
  impl Notifier for HungNotifier {
    async fn deliver(&self, _notice: Notice) -> Result<(), NotifyError> {
      std::future::pending().await
    }
  }

  async fn wait_for_first_word(store: &MemoryStore) {
    for _ in 0..200 {
      if store.word_count() > 0 {
        return;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("indexing never started");
  }

  /// Test: shutdown requested while an entity is being indexed.
  ///
  /// Validates:
  /// 1. The pass runs to completion before the daemon stops
  /// 2. Stored words agree with the watermark
  #[tokio::test]
  async fn test_shutdown_mid_index_completes_pass() {
    let faulty = FaultyStore::new(Arc::new(MemoryStore::new())).with_upsert_delay(Duration::from_millis(20));
    let ctx = DaemonTestContext::start_with(test_config(), Some(faulty));
    let store = ctx.store.clone();

    ctx
      .daemon
      .publish(single_event(
        Arc::new(WritingSubmitTask),
        EntityType::Writing,
        9,
        "one two three four five",
      ))
      .expect("publish");
    wait_for_first_word(&store).await;
    let report = ctx.daemon.shutdown().await;

    assert!(report.drained);
    assert_eq!(report.search.indexed, 1);
    let mark = store.last_indexed(EntityType::Writing, 9).await.unwrap().expect("watermark");
    assert_eq!(mark.words, 5);
    assert_eq!(store.entity_words(EntityType::Writing, 9).len(), 5);
  }

  /// Test: the drain timeout expires mid-pass. Workers are cancelled, but the
  /// pass already running still finishes and queued events are abandoned.
  #[tokio::test]
  async fn test_drain_timeout_cancels_between_events() {
    let mut config = test_config();
    config.bus.shutdown_timeout_ms = 10;
    let faulty = FaultyStore::new(Arc::new(MemoryStore::new())).with_upsert_delay(Duration::from_millis(30));
    let ctx = DaemonTestContext::start_with(config, Some(faulty));
    let store = ctx.store.clone();

    for id in 1..=3 {
      ctx
        .daemon
        .publish(single_event(Arc::new(WritingSubmitTask), EntityType::Writing, id, "slow words"))
        .expect("publish");
    }
    wait_for_first_word(&store).await;
    let report = ctx.daemon.shutdown().await;

    assert!(!report.drained);
    assert!(report.search.indexed >= 1);
    assert!(report.search.indexed < 3);
    for id in 1..=3 {
      let words = store.entity_words(EntityType::Writing, id);
      match store.last_indexed(EntityType::Writing, id).await.unwrap() {
        Some(mark) => assert_eq!(mark.words, words.len()),
        None => assert!(words.is_empty()),
      }
    }
  }

  /// Test: publishing after shutdown is refused.
  #[tokio::test]
  async fn test_publish_after_shutdown_fails() {
    let ctx = DaemonTestContext::start();
    let bus = ctx.daemon.bus().clone();
    ctx.daemon.shutdown().await;

    let event = single_event(Arc::new(WritingSubmitTask), EntityType::Writing, 1, "late");
    assert!(bus.publish(event).is_err());
  }

  /// Test: the notifier hangs forever on its first delivery.
  ///
  /// Validates:
  /// 1. Shutdown still returns, reporting it did not drain
  /// 2. The notification worker is abandoned without stats
  /// 3. The search worker's pass for the same event completed
  #[tokio::test]
  async fn test_hung_notifier_does_not_block_shutdown() {
    let mut config = test_config();
    config.bus.shutdown_timeout_ms = 50;
    let store = Arc::new(MemoryStore::new());
    let daemon = Daemon::start(
      RuntimeConfig::from_config(config),
      store.clone(),
      Arc::new(HungNotifier),
      Arc::new(TaskRegistry::with_catalog()),
    )
    .expect("start daemon");

    daemon
      .publish(single_event(Arc::new(LinkerApproveTask), EntityType::LinkerItem, 3, "queued link"))
      .expect("publish");

    let report = tokio::time::timeout(Duration::from_secs(3), daemon.shutdown())
      .await
      .expect("shutdown returned");

    assert!(!report.drained);
    assert_eq!(report.notify, None);
    assert_eq!(report.search.indexed, 1);
    assert!(store.last_indexed(EntityType::LinkerItem, 3).await.unwrap().is_some());
  }
}
