use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{debug, warn};

use super::{IndexError, store::SearchStore, store::StoreError};
use crate::{config::SearchConfig, domain::WordId};

/// How hard the dictionary tries after a lost insert race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveRetry {
  /// Re-fetch attempts after the first conflict
  pub max_retries: u32,
  /// Backoff before the first retry, doubled on each further attempt
  pub initial_backoff: Duration,
}

impl Default for ResolveRetry {
  fn default() -> Self {
    Self::from_config(&SearchConfig::default())
  }
}

impl ResolveRetry {
  pub fn from_config(config: &SearchConfig) -> Self {
    Self {
      max_retries: config.resolve_retries,
      initial_backoff: Duration::from_millis(config.resolve_backoff_ms),
    }
  }

  pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
    self.initial_backoff.saturating_mul(1u32 << attempt.min(16))
  }
}

/// Maps words to stable ids through the store's atomic get-or-create.
///
/// There is no cache: every call goes to the store.
#[derive(Clone)]
pub struct WordDictionary {
  store: Arc<dyn SearchStore>,
  retry: ResolveRetry,
}

impl WordDictionary {
  pub fn new(store: Arc<dyn SearchStore>, retry: ResolveRetry) -> Self {
    Self { store, retry }
  }

  /// Resolve `word` to its id, creating the entry if needed.
  pub async fn resolve(&self, word: &str) -> Result<WordId, IndexError> {
    let word = word.to_lowercase();
    let mut attempt = 0;

    loop {
      match self.store.get_or_create_word(&word).await {
        Ok(id) => return Ok(id),
        Err(StoreError::Conflict(reason)) => {
          debug!(word = %word, attempt, reason = %reason, "Word insert conflicted, re-fetching");
          if let Some(id) = self.store.word_id(&word).await? {
            return Ok(id);
          }

          if attempt >= self.retry.max_retries {
            warn!(word = %word, attempts = attempt + 1, "Giving up on conflicting word");
            return Err(IndexError::ConflictRetriesExhausted {
              word,
              attempts: attempt + 1,
            });
          }

          sleep(self.retry.backoff_for_attempt(attempt)).await;
          attempt += 1;
        }
        Err(e) => return Err(e.into()),
      }
    }
  }
}
