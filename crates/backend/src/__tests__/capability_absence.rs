//! Tasks without a capability must pass through the pipeline untouched.

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use pretty_assertions::assert_eq;

  use crate::{
    PublishRequest,
    __tests__::helpers::{DaemonTestContext, bulk_event},
    capability::{CapabilitySet, MISSING_TASK_NAME, Task, catalog::LinkerDeleteTask},
    domain::{EntityType, EventData, IndexEventData, IndexPayload},
    search::SearchStore,
  };

  /// Test: a task with no indexing or notification capability writes nothing.
  #[tokio::test]
  async fn test_bare_task_writes_nothing() {
    assert_eq!(LinkerDeleteTask.capabilities(), CapabilitySet::EMPTY);

    let ctx = DaemonTestContext::start();
    let (store, notifier) = (ctx.store.clone(), ctx.notifier.clone());
    ctx
      .daemon
      .publish(bulk_event(Arc::new(LinkerDeleteTask), &[(1, "removed link text")]))
      .expect("publish");
    let report = ctx.daemon.shutdown().await;

    assert_eq!(report.search.events, 1);
    assert_eq!(report.search.instructions, 0);
    assert_eq!(store.word_count(), 0);
    assert_eq!(store.stats().await.unwrap().total_associations(), 0);
    assert!(notifier.notices().is_empty());
  }

  /// Test: an unknown task name is published as the missing task and, having
  /// no capabilities, only its single payload is honored.
  #[tokio::test]
  async fn test_unknown_task_name() {
    let ctx = DaemonTestContext::start();
    let (store, notifier) = (ctx.store.clone(), ctx.notifier.clone());

    let request = PublishRequest {
      task: "legacy.import".into(),
      data: EventData::default().with_index(IndexPayload::Bulk(vec![IndexEventData::new(
        EntityType::Comment,
        3,
        "never indexed",
      )])),
      ..Default::default()
    };
    let event = request.into_event(ctx.daemon.registry());
    assert_eq!(event.task_name(), MISSING_TASK_NAME);

    ctx.daemon.publish(event).expect("publish");
    ctx.daemon.shutdown().await;

    assert!(store.last_indexed(EntityType::Comment, 3).await.unwrap().is_none());
    assert_eq!(store.word_count(), 0);
    assert!(notifier.notices().is_empty());
  }
}
