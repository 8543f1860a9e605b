//! Standing consumers of the task topic.
//!
//! Each worker owns one [`Subscription`] and runs until the bus closes it or
//! its cancellation token fires. Cancellation is only observed between
//! events: once a delivery is taken off the channel it is processed to
//! completion and then acknowledged.

pub mod dlq;
pub mod notify;
pub mod search;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::bus::{Delivery, Subscription};

pub use dlq::{DeadLetter, DeadLetterError, DeadLetterQueue, FileDeadLetterQueue, MemoryDeadLetterQueue};
pub use notify::{
  Audience, DEAD_LETTER_ALERT_TEMPLATE, Notice, NotificationWorker, Notifier, NotifyError, NotifyStats,
  TracingNotifier,
};
pub use search::{SearchWorker, WorkerStats};

/// Wait for the next delivery, or `None` when the worker should stop.
pub(crate) async fn next_delivery(
  worker: &'static str,
  subscription: &mut Subscription,
  cancel: &CancellationToken,
) -> Option<Delivery> {
  tokio::select! {
      biased;

      _ = cancel.cancelled() => {
          debug!(worker, "Worker cancelled");
          None
      }

      next = subscription.recv() => {
          if next.is_none() {
              debug!(worker, "Subscription closed");
          }
          next
      }
  }
}
