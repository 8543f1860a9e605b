//! End-to-end tests: publish through the daemon, then inspect the index and
//! the notices once it has shut down.

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use async_trait::async_trait;
  use pretty_assertions::assert_eq;

  use crate::{
    Daemon, PublishRequest, RuntimeConfig,
    __tests__::helpers::{DaemonTestContext, Fault, FaultyStore, bulk_event, single_event, test_config},
    capability::{
      TaskRegistry,
      catalog::{LinkerBulkApproveTask, RoleGrantTask, WritingSubmitTask},
    },
    domain::{EntityType, EventData, TaskEvent},
    search::{MemoryStore, SearchStore, search_entities},
    worker::{Audience, FileDeadLetterQueue, Notice, Notifier, NotifyError},
  };

  /// Transport that is down for the whole test.
  struct MailOutage;

  #[async_trait]
  impl Notifier for MailOutage {
    async fn deliver(&self, _notice: Notice) -> Result<(), NotifyError> {
      Err(NotifyError::Delivery("connection refused".into()))
    }
  }

  /// Test: a single-payload event is indexed and searchable after shutdown.
  #[tokio::test]
  async fn test_publish_index_and_search() {
    let ctx = DaemonTestContext::start();

    ctx
      .daemon
      .publish(single_event(
        Arc::new(WritingSubmitTask),
        EntityType::Writing,
        12,
        "Rust ownership explained",
      ))
      .expect("publish");
    let report = ctx.daemon.shutdown().await;

    assert!(report.drained);
    assert_eq!(report.search.indexed, 1);
    assert_eq!(
      search_entities(ctx.store.as_ref(), EntityType::Writing, "OWNERSHIP rust")
        .await
        .unwrap(),
      vec![12]
    );
  }

  /// Test: bulk approve of three links where the second one fails to index.
  ///
  /// Validates:
  /// 1. Items before and after the failure are indexed with watermarks
  /// 2. The failing item has no watermark
  /// 3. The failure is counted, not fatal
  #[tokio::test]
  async fn test_bulk_approve_partial_failure() {
    let faulty = FaultyStore::new(Arc::new(MemoryStore::new()));
    faulty.set_fault("broken", Fault::Fail);
    let ctx = DaemonTestContext::start_with(test_config(), Some(faulty));

    ctx
      .daemon
      .publish(bulk_event(
        Arc::new(LinkerBulkApproveTask),
        &[(1, "first link"), (2, "broken link"), (3, "third link")],
      ))
      .expect("publish");
    let store = ctx.store.clone();
    let report = ctx.daemon.shutdown().await;

    assert_eq!(report.search.instructions, 3);
    assert_eq!(report.search.indexed, 2);
    assert_eq!(report.search.failed, 1);

    assert!(store.last_indexed(EntityType::LinkerItem, 1).await.unwrap().is_some());
    assert!(store.last_indexed(EntityType::LinkerItem, 2).await.unwrap().is_none());
    assert!(store.last_indexed(EntityType::LinkerItem, 3).await.unwrap().is_some());
    assert_eq!(
      search_entities(store.as_ref(), EntityType::LinkerItem, "link").await.unwrap(),
      vec![1, 3]
    );
  }

  /// Test: notices reach admins, subscribers and targeted users.
  #[tokio::test]
  async fn test_notification_audiences() {
    let ctx = DaemonTestContext::start();
    let notifier = ctx.notifier.clone();

    ctx
      .daemon
      .publish(bulk_event(Arc::new(LinkerBulkApproveTask), &[(4, "news")]).with_path("/linker/queue"))
      .expect("publish");
    ctx
      .daemon
      .publish(TaskEvent::success(
        Arc::new(RoleGrantTask),
        EventData::default().with_targets([7]),
      ))
      .expect("publish");
    let report = ctx.daemon.shutdown().await;

    let audiences: Vec<Audience> = notifier.notices().into_iter().map(|n| n.audience).collect();
    assert_eq!(
      audiences,
      vec![
        Audience::Admin {
          email: "admin@example.com".into()
        },
        Audience::Subscribers {
          patterns: vec![
            "linker.bulk-approve:/linker/queue".into(),
            "linker.bulk-approve:/linker/*".into(),
            "linker.bulk-approve:/*".into(),
          ]
        },
        Audience::User { user_id: 7 },
      ]
    );
    assert_eq!(report.notify.map(|n| n.delivered), Some(3));
  }

  /// Test: a publish request naming a task is resolved through the registry.
  #[tokio::test]
  async fn test_publish_request_by_name() {
    let ctx = DaemonTestContext::start();
    let request: PublishRequest = serde_json::from_value(serde_json::json!({
      "task": "imagebbs.post",
      "path": "/imagebbs/board/1",
      "data": { "index": { "single": { "id": 5, "text": "Sunset photo" } } }
    }))
    .unwrap();

    ctx.daemon.publish_request(request).expect("publish");
    let store = ctx.store.clone();
    ctx.daemon.shutdown().await;

    assert_eq!(
      search_entities(store.as_ref(), EntityType::ImagePost, "sunset").await.unwrap(),
      vec![5]
    );
  }

  /// Test: with notifications disabled only the search worker runs.
  #[tokio::test]
  async fn test_notifications_disabled() {
    let mut config = test_config();
    config.worker.notifications_enabled = false;
    let ctx = DaemonTestContext::start_with(config, None);
    let notifier = ctx.notifier.clone();

    ctx
      .daemon
      .publish(single_event(Arc::new(WritingSubmitTask), EntityType::Writing, 1, "quiet"))
      .expect("publish");
    let report = ctx.daemon.shutdown().await;

    assert!(report.notify.is_none());
    assert!(notifier.notices().is_empty());
    assert_eq!(report.search.indexed, 1);
  }

  /// Test: every undeliverable notice ends up in the dead-letter file.
  ///
  /// Validates:
  /// 1. The admin notice and the actor's own notice are both recorded
  /// 2. The actor id travels with each letter
  /// 3. Indexing is unaffected by the outage
  #[tokio::test]
  async fn test_undeliverable_notices_are_dead_lettered() {
    let dir = tempfile::tempdir().unwrap();
    let dead_letter_path = dir.path().join("dead-letters.jsonl");
    let mut config = test_config();
    config.notifications.dead_letter_path = Some(dead_letter_path.clone());

    let store = Arc::new(MemoryStore::new());
    let daemon = Daemon::start(
      RuntimeConfig::from_config(config),
      store.clone(),
      Arc::new(MailOutage),
      Arc::new(TaskRegistry::with_catalog()),
    )
    .expect("start daemon");

    let request: PublishRequest = serde_json::from_value(serde_json::json!({
      "task": "faq.answer",
      "path": "/faq/answer/3",
      "user_id": 9
    }))
    .unwrap();
    daemon.publish_request(request).expect("publish");
    daemon
      .publish(single_event(Arc::new(WritingSubmitTask), EntityType::Writing, 2, "unaffected"))
      .expect("publish");
    let report = daemon.shutdown().await;

    assert!(report.drained);
    assert_eq!(report.search.indexed, 1);
    assert!(store.last_indexed(EntityType::Writing, 2).await.unwrap().is_some());

    let letters = FileDeadLetterQueue::new(&dead_letter_path).letters().await.unwrap();
    let audiences: Vec<Audience> = letters.iter().map(|l| l.notice.audience.clone()).collect();
    // The writing.submit subscriber notice fails too.
    assert_eq!(
      audiences,
      vec![
        Audience::Admin {
          email: "admin@example.com".into()
        },
        Audience::Actor { user_id: 9 },
        Audience::Subscribers {
          patterns: vec!["writing.submit:/*".into()]
        },
      ]
    );
    assert!(letters[..2].iter().all(|l| l.notice.actor_id == 9));
    assert_eq!(report.notify.map(|n| n.failed), Some(3));
  }
}
