use std::fmt;

use chrono::{DateTime, Utc};

use crate::domain::TaskEvent;

/// Channels of the bus. Subscribers pick one topic or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
  /// Completed user actions
  Tasks,
  /// Ask the mail sender to drain its queue
  EmailQueue,
  /// Ask the digest builder to run
  DigestRun,
}

impl Topic {
  pub const ALL: [Topic; 3] = [Topic::Tasks, Topic::EmailQueue, Topic::DigestRun];

  pub fn as_str(&self) -> &'static str {
    match self {
      Topic::Tasks => "tasks",
      Topic::EmailQueue => "email-queue",
      Topic::DigestRun => "digest-run",
    }
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone)]
pub enum BusMessage {
  Task(TaskEvent),
  EmailQueue { time: DateTime<Utc> },
  DigestRun { time: DateTime<Utc> },
}

impl BusMessage {
  pub fn email_queue() -> Self {
    BusMessage::EmailQueue { time: Utc::now() }
  }

  pub fn digest_run() -> Self {
    BusMessage::DigestRun { time: Utc::now() }
  }

  pub fn topic(&self) -> Topic {
    match self {
      BusMessage::Task(_) => Topic::Tasks,
      BusMessage::EmailQueue { .. } => Topic::EmailQueue,
      BusMessage::DigestRun { .. } => Topic::DigestRun,
    }
  }

  pub fn as_task(&self) -> Option<&TaskEvent> {
    match self {
      BusMessage::Task(event) => Some(event),
      _ => None,
    }
  }
}

impl From<TaskEvent> for BusMessage {
  fn from(event: TaskEvent) -> Self {
    BusMessage::Task(event)
  }
}
