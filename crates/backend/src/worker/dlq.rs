//! Dead letters: notices the notifier could not deliver.
//!
//! Every failed delivery is recorded so it can be inspected and resent
//! later. The notification worker alerts admins when the queue reaches 1,
//! 10, 100, ... letters.

use std::{
  path::{Path, PathBuf},
  sync::Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::{Notice, NotifyError};

#[derive(Debug, thiserror::Error)]
pub enum DeadLetterError {
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

/// A notice that failed, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadLetter {
  pub notice: Notice,
  pub error: String,
  pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
  pub fn new(notice: Notice, error: &NotifyError) -> Self {
    Self {
      notice,
      error: error.to_string(),
      failed_at: Utc::now(),
    }
  }
}

#[async_trait]
pub trait DeadLetterQueue: Send + Sync {
  /// Store `letter`. Returns how many letters the queue holds afterwards.
  async fn record(&self, letter: &DeadLetter) -> Result<u64, DeadLetterError>;
}

/// True for 1, 10, 100, ...
pub(crate) fn is_power_of_ten(mut n: u64) -> bool {
  if n == 0 {
    return false;
  }
  while n % 10 == 0 {
    n /= 10;
  }
  n == 1
}

// ============================================================================
// FileDeadLetterQueue
// ============================================================================

/// Appends letters to a JSON Lines file.
pub struct FileDeadLetterQueue {
  path: PathBuf,
  /// Letters in the file, counted on first use
  count: tokio::sync::Mutex<Option<u64>>,
}

impl FileDeadLetterQueue {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      count: tokio::sync::Mutex::new(None),
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Every letter in the file, oldest first. A missing file has none.
  pub async fn letters(&self) -> Result<Vec<DeadLetter>, DeadLetterError> {
    let raw = match tokio::fs::read_to_string(&self.path).await {
      Ok(raw) => raw,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };
    raw
      .lines()
      .filter(|line| !line.trim().is_empty())
      .map(|line| serde_json::from_str(line).map_err(DeadLetterError::from))
      .collect()
  }

  async fn existing_count(&self) -> Result<u64, DeadLetterError> {
    match tokio::fs::read_to_string(&self.path).await {
      Ok(raw) => Ok(raw.lines().filter(|line| !line.trim().is_empty()).count() as u64),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
      Err(e) => Err(e.into()),
    }
  }
}

#[async_trait]
impl DeadLetterQueue for FileDeadLetterQueue {
  #[tracing::instrument(level = "trace", skip(self, letter), fields(path = %self.path.display()))]
  async fn record(&self, letter: &DeadLetter) -> Result<u64, DeadLetterError> {
    let mut count = self.count.lock().await;
    let existing = match *count {
      Some(n) => n,
      None => self.existing_count().await?,
    };

    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_vec(letter)?;
    line.push(b'\n');
    let mut file = tokio::fs::OpenOptions::new()
      .create(true)
      .append(true)
      .open(&self.path)
      .await?;
    file.write_all(&line).await?;
    file.flush().await?;

    let total = existing + 1;
    *count = Some(total);
    debug!(total, event_id = %letter.notice.event_id, "Dead letter recorded");
    Ok(total)
  }
}

// ============================================================================
// MemoryDeadLetterQueue
// ============================================================================

/// Keeps letters in memory.
#[derive(Default)]
pub struct MemoryDeadLetterQueue {
  letters: Mutex<Vec<DeadLetter>>,
}

impl MemoryDeadLetterQueue {
  pub fn letters(&self) -> Vec<DeadLetter> {
    self.letters.lock().map(|l| l.clone()).unwrap_or_default()
  }
}

#[async_trait]
impl DeadLetterQueue for MemoryDeadLetterQueue {
  async fn record(&self, letter: &DeadLetter) -> Result<u64, DeadLetterError> {
    let mut letters = self
      .letters
      .lock()
      .map_err(|_| std::io::Error::other("dead letter queue lock poisoned"))?;
    letters.push(letter.clone());
    Ok(letters.len() as u64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{capability::NotificationTemplate, worker::Audience};
  use pretty_assertions::assert_eq;
  use uuid::Uuid;

  fn letter(email: &str) -> DeadLetter {
    let notice = Notice {
      audience: Audience::Admin { email: email.into() },
      template: NotificationTemplate::email("adminNotificationLinkerApproved"),
      task: "linker.approve".into(),
      event_id: Uuid::now_v7(),
      path: "/linker/show/1".into(),
      actor_id: 4,
      actor: None,
      link_url: None,
    };
    DeadLetter::new(notice, &NotifyError::Delivery("smtp down".into()))
  }

  #[test]
  fn test_is_power_of_ten() {
    let hits: Vec<u64> = (0..=1000).filter(|n| is_power_of_ten(*n)).collect();
    assert_eq!(hits, vec![1, 10, 100, 1000]);
  }

  /// Test: letters are appended as JSON lines and read back in order.
  ///
  /// Validates:
  /// 1. Parent directories are created
  /// 2. `record` returns the running total
  /// 3. A second queue over the same file continues the count
  #[tokio::test]
  async fn test_file_queue_appends_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("dead-letters.jsonl");
    let queue = FileDeadLetterQueue::new(&path);

    assert!(queue.letters().await.unwrap().is_empty());
    assert_eq!(queue.record(&letter("a@example.com")).await.unwrap(), 1);
    assert_eq!(queue.record(&letter("b@example.com")).await.unwrap(), 2);

    let letters = queue.letters().await.unwrap();
    assert_eq!(letters.len(), 2);
    assert_eq!(letters[0].notice.audience, Audience::Admin { email: "a@example.com".into() });
    assert_eq!(letters[1].error, "Delivery failed: smtp down");
    assert_eq!(letters[1].notice.actor_id, 4);

    let reopened = FileDeadLetterQueue::new(&path);
    assert_eq!(reopened.record(&letter("c@example.com")).await.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_memory_queue_counts() {
    let queue = MemoryDeadLetterQueue::default();
    assert_eq!(queue.record(&letter("a@example.com")).await.unwrap(), 1);
    assert_eq!(queue.letters().len(), 1);
  }
}
