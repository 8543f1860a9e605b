//! In-process topic pub/sub with graceful shutdown.
//!
//! Every subscription owns a bounded channel, and publishing fans a message
//! out to every subscription of its topic. Publishing never waits: when a
//! subscriber's buffer is full the message is dropped for that subscriber
//! only and counted.
//!
//! ```text
//!                      ┌─▶ [cap] ─▶ SearchWorker
//! publish(msg) ─ topic ┼─▶ [cap] ─▶ NotificationWorker
//!                      └─▶ [cap] ─▶ subscribe_all() consumer
//! ```
//!
//! Each [`Delivery`] carries an ack guard. [`EventBus::shutdown`] stops new
//! publishes, closes every channel so consumers drain what is buffered and
//! then see the end of their stream, and waits until every accepted delivery
//! has been dropped or the timeout passes.

mod delivery;
mod message;

use std::{
  sync::{
    Arc, RwLock, RwLockReadGuard, RwLockWriteGuard,
    atomic::{AtomicBool, AtomicU64, Ordering},
  },
  time::Duration,
};

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub use delivery::Delivery;
use delivery::InFlight;
pub use message::{BusMessage, Topic};

use crate::{capability::MISSING_TASK_NAME, config::BusConfig};

// ============================================================================
// Errors and reports
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
  #[error("Event bus is closed")]
  Closed,
  #[error("Shutdown timed out with {pending} deliveries still unacknowledged")]
  ShutdownTimeout { pending: usize },
}

/// Result of fanning out one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PublishReport {
  /// Subscribers whose channel accepted the message
  pub delivered: usize,
  /// Subscribers whose channel was full
  pub dropped: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
  pub published: u64,
  pub delivered: u64,
  pub dropped: u64,
  pub subscribers: usize,
  pub in_flight: usize,
}

// ============================================================================
// Subscription
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TopicFilter {
  One(Topic),
  All,
}

impl TopicFilter {
  fn matches(self, topic: Topic) -> bool {
    match self {
      TopicFilter::One(t) => t == topic,
      TopicFilter::All => true,
    }
  }
}

#[derive(Debug)]
struct Subscriber {
  id: u64,
  filter: TopicFilter,
  tx: mpsc::Sender<Delivery>,
}

/// Receiving end of one subscription.
///
/// `recv` yields `None` once the bus has shut down and the buffer is drained.
#[derive(Debug)]
pub struct Subscription {
  id: u64,
  rx: mpsc::Receiver<Delivery>,
}

impl Subscription {
  pub fn id(&self) -> u64 {
    self.id
  }

  pub async fn recv(&mut self) -> Option<Delivery> {
    self.rx.recv().await
  }

  pub fn try_recv(&mut self) -> Option<Delivery> {
    self.rx.try_recv().ok()
  }
}

// ============================================================================
// EventBus
// ============================================================================

#[derive(Debug)]
struct BusInner {
  subscribers: RwLock<Vec<Subscriber>>,
  closed: AtomicBool,
  next_id: AtomicU64,
  capacity: usize,
  in_flight: Arc<InFlight>,
  cancel: CancellationToken,
  published: AtomicU64,
  delivered: AtomicU64,
  dropped: AtomicU64,
}

/// Handle to the bus. Cheap to clone; every clone talks to the same bus.
#[derive(Debug, Clone)]
pub struct EventBus {
  inner: Arc<BusInner>,
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new(&BusConfig::default())
  }
}

impl EventBus {
  pub fn new(config: &BusConfig) -> Self {
    Self::with_capacity(config.channel_capacity)
  }

  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      inner: Arc::new(BusInner {
        subscribers: RwLock::new(Vec::new()),
        closed: AtomicBool::new(false),
        next_id: AtomicU64::new(1),
        capacity: capacity.max(1),
        in_flight: Arc::new(InFlight::default()),
        cancel: CancellationToken::new(),
        published: AtomicU64::new(0),
        delivered: AtomicU64::new(0),
        dropped: AtomicU64::new(0),
      }),
    }
  }

  fn read_subscribers(&self) -> RwLockReadGuard<'_, Vec<Subscriber>> {
    self.inner.subscribers.read().unwrap_or_else(|e| e.into_inner())
  }

  fn write_subscribers(&self) -> RwLockWriteGuard<'_, Vec<Subscriber>> {
    self.inner.subscribers.write().unwrap_or_else(|e| e.into_inner())
  }

  /// Receive every message published on `topic` from now on.
  pub fn subscribe(&self, topic: Topic) -> Result<Subscription, BusError> {
    self.add_subscriber(TopicFilter::One(topic))
  }

  /// Receive every message on every topic from now on.
  pub fn subscribe_all(&self) -> Result<Subscription, BusError> {
    self.add_subscriber(TopicFilter::All)
  }

  fn add_subscriber(&self, filter: TopicFilter) -> Result<Subscription, BusError> {
    let mut subscribers = self.write_subscribers();
    if self.is_closed() {
      return Err(BusError::Closed);
    }

    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel(self.inner.capacity);
    subscribers.push(Subscriber { id, filter, tx });
    debug!(subscriber = id, filter = ?filter, "Subscribed to event bus");
    Ok(Subscription { id, rx })
  }

  /// Fan `message` out to the subscribers of its topic without waiting.
  pub fn publish(&self, message: impl Into<BusMessage>) -> Result<PublishReport, BusError> {
    let message = Arc::new(message.into());
    let topic = message.topic();

    if let Some(event) = message.as_task()
      && event.task_name() == MISSING_TASK_NAME
    {
      warn!(event_id = %event.id, path = %event.path, "Publishing event for an unregistered task");
    }

    let mut report = PublishReport {
      delivered: 0,
      dropped: 0,
    };
    let mut gone = Vec::new();

    {
      let subscribers = self.read_subscribers();
      if self.is_closed() {
        return Err(BusError::Closed);
      }

      for sub in subscribers.iter().filter(|s| s.filter.matches(topic)) {
        let delivery = Delivery::new(Arc::clone(&message), self.inner.in_flight.acquire());
        match sub.tx.try_send(delivery) {
          Ok(()) => report.delivered += 1,
          Err(TrySendError::Full(_)) => {
            report.dropped += 1;
            warn!(subscriber = sub.id, topic = %topic, "Subscriber buffer full, dropping message");
          }
          Err(TrySendError::Closed(_)) => gone.push(sub.id),
        }
      }
    }

    if !gone.is_empty() {
      self.write_subscribers().retain(|s| !gone.contains(&s.id));
      debug!(count = gone.len(), "Pruned closed subscribers");
    }

    self.inner.published.fetch_add(1, Ordering::Relaxed);
    self.inner.delivered.fetch_add(report.delivered as u64, Ordering::Relaxed);
    self.inner.dropped.fetch_add(report.dropped as u64, Ordering::Relaxed);
    trace!(topic = %topic, delivered = report.delivered, dropped = report.dropped, "Published");

    Ok(report)
  }

  pub fn is_closed(&self) -> bool {
    self.inner.closed.load(Ordering::SeqCst)
  }

  /// Token cancelled when shutdown begins.
  pub fn closed_token(&self) -> CancellationToken {
    self.inner.cancel.clone()
  }

  pub fn stats(&self) -> BusStats {
    BusStats {
      published: self.inner.published.load(Ordering::Relaxed),
      delivered: self.inner.delivered.load(Ordering::Relaxed),
      dropped: self.inner.dropped.load(Ordering::Relaxed),
      subscribers: self.read_subscribers().len(),
      in_flight: self.inner.in_flight.pending(),
    }
  }

  /// Stop accepting publishes, close every subscription and wait for
  /// outstanding deliveries to be acknowledged.
  ///
  /// Safe to call more than once; later calls only wait.
  pub async fn shutdown(&self, timeout: Duration) -> Result<(), BusError> {
    let first = {
      let mut subscribers = self.write_subscribers();
      let first = !self.inner.closed.swap(true, Ordering::SeqCst);
      subscribers.clear();
      first
    };

    if first {
      info!(pending = self.inner.in_flight.pending(), "Event bus shutting down");
      self.inner.cancel.cancel();
    }

    match tokio::time::timeout(timeout, self.inner.in_flight.wait_idle()).await {
      Ok(()) => {
        debug!("All deliveries acknowledged");
        Ok(())
      }
      Err(_) => {
        let pending = self.inner.in_flight.pending();
        warn!(pending, "Event bus shutdown timed out");
        Err(BusError::ShutdownTimeout { pending })
      }
    }
  }
}
