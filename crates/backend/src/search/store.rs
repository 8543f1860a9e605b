use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{EntityType, Watermark, WordId};

#[derive(Error, Debug)]
pub enum StoreError {
  /// A word insert lost a race and the store could not read the winner back atomically.
  #[error("Conflict: {0}")]
  Conflict(String),
  #[error("Not found: {0}")]
  NotFound(String),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("Serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("Backend error: {0}")]
  Backend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A dictionary word with its total usage across every entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
  pub word: String,
  pub count: u64,
}

/// Paging and filtering for the admin word list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordListQuery {
  pub prefix: Option<String>,
  pub limit: usize,
  pub offset: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeStats {
  pub entities: usize,
  pub associations: usize,
  pub occurrences: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
  pub words: usize,
  pub by_type: Vec<(EntityType, EntityTypeStats)>,
}

impl IndexStats {
  pub fn total_associations(&self) -> usize {
    self.by_type.iter().map(|(_, s)| s.associations).sum()
  }

  pub fn for_type(&self, entity_type: EntityType) -> EntityTypeStats {
    self
      .by_type
      .iter()
      .find(|(ty, _)| *ty == entity_type)
      .map(|(_, s)| *s)
      .unwrap_or_default()
  }
}

/// What `clear_entity_type` removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearReport {
  pub associations: usize,
  pub watermarks: usize,
}

/// Persistence contract for the search index.
///
/// Implementations own three pieces of state: the shared word dictionary,
/// per-entity word associations, and per-entity last-indexed watermarks.
/// Every method must be safe to call concurrently.
#[async_trait]
pub trait SearchStore: Send + Sync {
  /// Return the id for `word`, creating it if absent. Concurrent calls for the
  /// same word must agree on one id.
  async fn get_or_create_word(&self, word: &str) -> Result<WordId>;

  /// Look up an existing word without creating it.
  async fn word_id(&self, word: &str) -> Result<Option<WordId>>;

  /// Insert or overwrite the occurrence count of `word` in one entity.
  async fn upsert_association(&self, entity_type: EntityType, entity_id: i64, word: WordId, count: u32) -> Result<()>;

  /// Drop every association of the entity whose word is not in `keep`.
  /// Returns how many were removed.
  async fn prune_associations(&self, entity_type: EntityType, entity_id: i64, keep: &[WordId]) -> Result<usize>;

  /// Advance the entity's watermark to now.
  async fn set_last_indexed(&self, entity_type: EntityType, entity_id: i64, words: usize) -> Result<Watermark>;

  async fn last_indexed(&self, entity_type: EntityType, entity_id: i64) -> Result<Option<Watermark>>;

  /// Ids of entities of `entity_type` associated with `word`, ascending.
  async fn entities_with_word(&self, entity_type: EntityType, word: WordId) -> Result<Vec<i64>>;

  /// Dictionary words ordered alphabetically with their summed occurrence counts.
  async fn word_list(&self, query: &WordListQuery) -> Result<Vec<WordCount>>;

  async fn count_words(&self, prefix: Option<&str>) -> Result<usize>;

  async fn stats(&self) -> Result<IndexStats>;

  /// Remove every association and watermark of one entity type. The
  /// dictionary is left alone.
  async fn clear_entity_type(&self, entity_type: EntityType) -> Result<ClearReport>;
}
