use std::{
  ops::Deref,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use tokio::sync::Notify;

use super::BusMessage;

/// Counts deliveries that were accepted by a subscriber channel but not yet
/// acknowledged.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
  count: AtomicUsize,
  idle: Notify,
}

impl InFlight {
  pub(crate) fn acquire(self: &Arc<Self>) -> AckGuard {
    self.count.fetch_add(1, Ordering::SeqCst);
    AckGuard {
      in_flight: Arc::clone(self),
    }
  }

  pub(crate) fn pending(&self) -> usize {
    self.count.load(Ordering::SeqCst)
  }

  /// Resolves once every outstanding delivery has been acknowledged.
  pub(crate) async fn wait_idle(&self) {
    loop {
      let notified = self.idle.notified();
      if self.pending() == 0 {
        return;
      }
      notified.await;
    }
  }
}

/// Acknowledges its delivery when dropped.
#[derive(Debug)]
pub(crate) struct AckGuard {
  in_flight: Arc<InFlight>,
}

impl Drop for AckGuard {
  fn drop(&mut self) {
    if self.in_flight.count.fetch_sub(1, Ordering::SeqCst) == 1 {
      self.in_flight.idle.notify_waiters();
    }
  }
}

/// One message handed to one subscriber.
///
/// Dropping the delivery acknowledges it. Shutdown waits for every accepted
/// delivery to be acknowledged, so hold it until processing is finished.
#[derive(Debug)]
pub struct Delivery {
  message: Arc<BusMessage>,
  _ack: AckGuard,
}

impl Delivery {
  pub(crate) fn new(message: Arc<BusMessage>, ack: AckGuard) -> Self {
    Self { message, _ack: ack }
  }

  pub fn message(&self) -> &BusMessage {
    &self.message
  }

  /// Acknowledge now rather than at end of scope.
  pub fn ack(self) {
    drop(self);
  }
}

impl Deref for Delivery {
  type Target = BusMessage;

  fn deref(&self) -> &BusMessage {
    &self.message
  }
}
