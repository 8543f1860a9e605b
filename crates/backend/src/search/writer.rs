use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tracing::debug;

use super::{
  IndexError,
  dictionary::{ResolveRetry, WordDictionary},
  store::SearchStore,
  tokenizer::tokenize,
};
use crate::domain::{EntityType, WordId};

/// Summary of one successful index pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexOutcome {
  pub entity_type: EntityType,
  pub entity_id: i64,
  /// Distinct words now associated with the entity
  pub words: usize,
  pub occurrences: u64,
  /// Stale associations removed by this pass
  pub pruned: usize,
}

/// Writes word frequencies for one entity and advances its watermark.
///
/// Counts overwrite whatever the previous pass stored, and words no longer
/// present are pruned, so the index always mirrors the latest text. When any
/// step fails the remaining words are skipped and the watermark is left
/// where it was.
#[derive(Clone)]
pub struct IndexWriter {
  store: Arc<dyn SearchStore>,
  dictionary: WordDictionary,
}

impl IndexWriter {
  pub fn new(store: Arc<dyn SearchStore>, retry: ResolveRetry) -> Self {
    let dictionary = WordDictionary::new(Arc::clone(&store), retry);
    Self { store, dictionary }
  }

  pub fn store(&self) -> &Arc<dyn SearchStore> {
    &self.store
  }

  #[tracing::instrument(level = "trace", skip(self, frequencies), fields(words = frequencies.len()))]
  pub async fn index(
    &self,
    entity_type: EntityType,
    entity_id: i64,
    frequencies: &HashMap<String, u32>,
  ) -> Result<IndexOutcome, IndexError> {
    if entity_id == 0 {
      return Err(IndexError::InvalidInput(format!("{entity_type} id must be non-zero")));
    }

    let mut entries: Vec<(&String, &u32)> = frequencies.iter().filter(|(_, count)| **count > 0).collect();
    entries.sort();

    let mut keep: Vec<WordId> = Vec::with_capacity(entries.len());
    let mut occurrences = 0u64;
    for (word, count) in entries {
      let word_id = self.dictionary.resolve(word).await?;
      self
        .store
        .upsert_association(entity_type, entity_id, word_id, *count)
        .await?;
      keep.push(word_id);
      occurrences += u64::from(*count);
    }
    keep.sort_unstable();
    keep.dedup();

    let pruned = self.store.prune_associations(entity_type, entity_id, &keep).await?;
    self.store.set_last_indexed(entity_type, entity_id, keep.len()).await?;

    debug!(
      entity_type = %entity_type,
      entity_id,
      words = keep.len(),
      occurrences,
      pruned,
      "Indexed entity"
    );

    Ok(IndexOutcome {
      entity_type,
      entity_id,
      words: keep.len(),
      occurrences,
      pruned,
    })
  }

  /// Tokenize `text` and index the result.
  pub async fn index_text(&self, entity_type: EntityType, entity_id: i64, text: &str) -> Result<IndexOutcome, IndexError> {
    self.index(entity_type, entity_id, &tokenize(text)).await
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::{
    __tests__::helpers::{Fault, FaultyStore},
    search::MemoryStore,
  };
  use pretty_assertions::assert_eq;

  fn counts(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
    pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect()
  }

  #[tokio::test]
  async fn test_index_go_gophers() {
    let store = Arc::new(MemoryStore::new());
    let writer = IndexWriter::new(store.clone(), ResolveRetry::default());

    let outcome = writer.index_text(EntityType::LinkerItem, 42, "Go Go gophers").await.unwrap();
    assert_eq!(outcome.words, 2);
    assert_eq!(outcome.occurrences, 3);

    assert_eq!(
      store.entity_words(EntityType::LinkerItem, 42),
      counts(&[("go", 2), ("gophers", 1)])
    );
    let mark = store.last_indexed(EntityType::LinkerItem, 42).await.unwrap().unwrap();
    assert_eq!(mark.words, 2);
  }

  #[tokio::test]
  async fn test_reindex_overwrites_rather_than_accumulates() {
    let store = Arc::new(MemoryStore::new());
    let writer = IndexWriter::new(store.clone(), ResolveRetry::default());

    writer.index_text(EntityType::Comment, 5, "echo echo echo").await.unwrap();
    writer.index_text(EntityType::Comment, 5, "echo echo echo").await.unwrap();
    assert_eq!(store.entity_words(EntityType::Comment, 5), counts(&[("echo", 3)]));

    writer.index_text(EntityType::Comment, 5, "echo").await.unwrap();
    assert_eq!(store.entity_words(EntityType::Comment, 5), counts(&[("echo", 1)]));
  }

  #[tokio::test]
  async fn test_reindex_prunes_removed_words() {
    let store = Arc::new(MemoryStore::new());
    let writer = IndexWriter::new(store.clone(), ResolveRetry::default());

    writer.index_text(EntityType::Writing, 1, "old draft text").await.unwrap();
    let outcome = writer.index_text(EntityType::Writing, 1, "new text").await.unwrap();
    assert_eq!(outcome.pruned, 2);
    assert_eq!(store.entity_words(EntityType::Writing, 1), counts(&[("new", 1), ("text", 1)]));

    // Dictionary entries survive pruning
    assert!(store.word_id("draft").await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_zero_id_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let writer = IndexWriter::new(store.clone(), ResolveRetry::default());

    let err = writer.index_text(EntityType::Comment, 0, "hello").await.unwrap_err();
    assert!(matches!(err, IndexError::InvalidInput(_)));
    assert_eq!(store.word_count(), 0);
  }

  #[tokio::test]
  async fn test_failure_leaves_watermark_untouched() {
    let inner = Arc::new(MemoryStore::new());
    let store = FaultyStore::new(inner.clone());
    store.set_fault("poison", Fault::Fail);
    let writer = IndexWriter::new(Arc::new(store), ResolveRetry::default());

    let err = writer
      .index_text(EntityType::LinkerItem, 2, "alpha poison zulu")
      .await
      .unwrap_err();
    assert!(matches!(err, IndexError::Store(_)));

    assert!(inner.last_indexed(EntityType::LinkerItem, 2).await.unwrap().is_none());
    // Words after the failing one were never written
    assert!(inner.word_id("zulu").await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_empty_text_clears_associations() {
    let store = Arc::new(MemoryStore::new());
    let writer = IndexWriter::new(store.clone(), ResolveRetry::default());

    writer.index_text(EntityType::ImagePost, 9, "a picture").await.unwrap();
    let outcome = writer.index_text(EntityType::ImagePost, 9, "...").await.unwrap();
    assert_eq!(outcome.words, 0);
    assert!(store.entity_words(EntityType::ImagePost, 9).is_empty());
    assert!(store.last_indexed(EntityType::ImagePost, 9).await.unwrap().is_some());
  }
}
