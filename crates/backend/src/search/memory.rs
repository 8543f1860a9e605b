//! In-process search store backed by `DashMap`, with JSON snapshots.
//!
//! Every map uses DashMap's per-shard entry locking, so get-or-create of a
//! word and upsert of an association are atomic without a global lock.

use std::{
  collections::{BTreeMap, HashMap, HashSet},
  path::Path,
  sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::store::{
  ClearReport, EntityTypeStats, IndexStats, Result, SearchStore, StoreError, WordCount, WordListQuery,
};
use crate::domain::{EntityType, Watermark, WordId};

type EntityKey = (EntityType, i64);

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug)]
pub struct MemoryStore {
  words: DashMap<String, WordId>,
  next_word_id: AtomicI64,
  associations: DashMap<EntityKey, HashMap<WordId, u32>>,
  watermarks: DashMap<EntityKey, Watermark>,
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      words: DashMap::new(),
      next_word_id: AtomicI64::new(1),
      associations: DashMap::new(),
      watermarks: DashMap::new(),
    }
  }

  /// Load a snapshot if one exists at `path`, otherwise start empty.
  pub async fn open(path: &Path) -> Result<Self> {
    if tokio::fs::try_exists(path).await? {
      Self::load_snapshot(path).await
    } else {
      debug!(path = %path.display(), "No snapshot found, starting with an empty index");
      Ok(Self::new())
    }
  }

  /// Words associated with one entity and their counts, keyed by word text.
  pub fn entity_words(&self, entity_type: EntityType, entity_id: i64) -> BTreeMap<String, u32> {
    let Some(assoc) = self.associations.get(&(entity_type, entity_id)).map(|a| a.value().clone()) else {
      return BTreeMap::new();
    };
    self
      .words
      .iter()
      .filter_map(|entry| assoc.get(entry.value()).map(|count| (entry.key().clone(), *count)))
      .collect()
  }

  pub fn word_count(&self) -> usize {
    self.words.len()
  }

  // ==========================================================================
  // Snapshots
  // ==========================================================================

  fn to_snapshot(&self) -> Snapshot {
    let words: BTreeMap<String, WordId> = self.words.iter().map(|e| (e.key().clone(), *e.value())).collect();

    let mut associations: Vec<AssociationRecord> = self
      .associations
      .iter()
      .flat_map(|entry| {
        let (entity_type, entity_id) = *entry.key();
        entry
          .value()
          .iter()
          .map(|(word_id, count)| AssociationRecord {
            entity_type,
            entity_id,
            word_id: *word_id,
            count: *count,
          })
          .collect::<Vec<_>>()
      })
      .collect();
    associations.sort_by_key(|r| (r.entity_type, r.entity_id, r.word_id));

    let mut watermarks: Vec<WatermarkRecord> = self
      .watermarks
      .iter()
      .map(|entry| WatermarkRecord {
        entity_type: entry.key().0,
        entity_id: entry.key().1,
        watermark: *entry.value(),
      })
      .collect();
    watermarks.sort_by_key(|r| (r.entity_type, r.entity_id));

    Snapshot {
      version: SNAPSHOT_VERSION,
      next_word_id: self.next_word_id.load(Ordering::SeqCst),
      words,
      associations,
      watermarks,
    }
  }

  fn from_snapshot(snapshot: Snapshot) -> Self {
    let store = Self::new();
    let max_id = snapshot.words.values().map(|id| id.0).max().unwrap_or(0);
    store
      .next_word_id
      .store(snapshot.next_word_id.max(max_id + 1), Ordering::SeqCst);

    for (word, id) in snapshot.words {
      store.words.insert(word, id);
    }
    for record in snapshot.associations {
      store
        .associations
        .entry((record.entity_type, record.entity_id))
        .or_default()
        .insert(record.word_id, record.count);
    }
    for record in snapshot.watermarks {
      store
        .watermarks
        .insert((record.entity_type, record.entity_id), record.watermark);
    }
    store
  }

  /// Write the whole index as pretty JSON. The file is replaced atomically.
  #[tracing::instrument(level = "trace", skip(self, path), fields(path = %path.display()))]
  pub async fn save_snapshot(&self, path: &Path) -> Result<()> {
    let snapshot = self.to_snapshot();
    let bytes = serde_json::to_vec_pretty(&snapshot)?;

    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(
      path = %path.display(),
      words = snapshot.words.len(),
      associations = snapshot.associations.len(),
      "Saved index snapshot"
    );
    Ok(())
  }

  #[tracing::instrument(level = "trace", skip(path), fields(path = %path.display()))]
  pub async fn load_snapshot(path: &Path) -> Result<Self> {
    let bytes = tokio::fs::read(path).await?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    if snapshot.version != SNAPSHOT_VERSION {
      return Err(StoreError::Backend(format!(
        "unsupported snapshot version {} (expected {})",
        snapshot.version, SNAPSHOT_VERSION
      )));
    }
    debug!(path = %path.display(), words = snapshot.words.len(), "Loaded index snapshot");
    Ok(Self::from_snapshot(snapshot))
  }
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
  version: u32,
  next_word_id: i64,
  words: BTreeMap<String, WordId>,
  associations: Vec<AssociationRecord>,
  watermarks: Vec<WatermarkRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssociationRecord {
  entity_type: EntityType,
  entity_id: i64,
  word_id: WordId,
  count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkRecord {
  entity_type: EntityType,
  entity_id: i64,
  #[serde(flatten)]
  watermark: Watermark,
}

#[async_trait]
impl SearchStore for MemoryStore {
  #[tracing::instrument(level = "trace", skip(self))]
  async fn get_or_create_word(&self, word: &str) -> Result<WordId> {
    let id = *self
      .words
      .entry(word.to_string())
      .or_insert_with(|| WordId(self.next_word_id.fetch_add(1, Ordering::SeqCst)));
    Ok(id)
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn word_id(&self, word: &str) -> Result<Option<WordId>> {
    Ok(self.words.get(word).map(|id| *id))
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn upsert_association(&self, entity_type: EntityType, entity_id: i64, word: WordId, count: u32) -> Result<()> {
    self
      .associations
      .entry((entity_type, entity_id))
      .or_default()
      .insert(word, count);
    Ok(())
  }

  #[tracing::instrument(level = "trace", skip(self, keep), fields(keep = keep.len()))]
  async fn prune_associations(&self, entity_type: EntityType, entity_id: i64, keep: &[WordId]) -> Result<usize> {
    let keep: HashSet<WordId> = keep.iter().copied().collect();
    let key = (entity_type, entity_id);

    let removed = match self.associations.get_mut(&key) {
      Some(mut assoc) => {
        let before = assoc.len();
        assoc.retain(|word, _| keep.contains(word));
        before - assoc.len()
      }
      None => 0,
    };
    self.associations.remove_if(&key, |_, assoc| assoc.is_empty());
    Ok(removed)
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn set_last_indexed(&self, entity_type: EntityType, entity_id: i64, words: usize) -> Result<Watermark> {
    let watermark = Watermark {
      indexed_at: Utc::now(),
      words,
    };
    self.watermarks.insert((entity_type, entity_id), watermark);
    Ok(watermark)
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn last_indexed(&self, entity_type: EntityType, entity_id: i64) -> Result<Option<Watermark>> {
    Ok(self.watermarks.get(&(entity_type, entity_id)).map(|w| *w))
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn entities_with_word(&self, entity_type: EntityType, word: WordId) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> = self
      .associations
      .iter()
      .filter(|entry| entry.key().0 == entity_type && entry.value().contains_key(&word))
      .map(|entry| entry.key().1)
      .collect();
    ids.sort_unstable();
    Ok(ids)
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn word_list(&self, query: &WordListQuery) -> Result<Vec<WordCount>> {
    let mut totals: HashMap<WordId, u64> = HashMap::new();
    for entry in self.associations.iter() {
      for (word, count) in entry.value() {
        *totals.entry(*word).or_insert(0) += u64::from(*count);
      }
    }

    let mut words: Vec<(String, WordId)> = self
      .words
      .iter()
      .filter(|entry| query.prefix.as_deref().is_none_or(|p| entry.key().starts_with(p)))
      .map(|entry| (entry.key().clone(), *entry.value()))
      .collect();
    words.sort();

    let limit = if query.limit == 0 { usize::MAX } else { query.limit };
    Ok(
      words
        .into_iter()
        .skip(query.offset)
        .take(limit)
        .map(|(word, id)| WordCount {
          count: totals.get(&id).copied().unwrap_or(0),
          word,
        })
        .collect(),
    )
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn count_words(&self, prefix: Option<&str>) -> Result<usize> {
    Ok(match prefix {
      Some(p) => self.words.iter().filter(|e| e.key().starts_with(p)).count(),
      None => self.words.len(),
    })
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn stats(&self) -> Result<IndexStats> {
    let mut by_type: BTreeMap<EntityType, EntityTypeStats> =
      EntityType::ALL.iter().map(|ty| (*ty, EntityTypeStats::default())).collect();

    for entry in self.associations.iter() {
      let stats = by_type.entry(entry.key().0).or_default();
      stats.entities += 1;
      stats.associations += entry.value().len();
      stats.occurrences += entry.value().values().map(|c| u64::from(*c)).sum::<u64>();
    }

    Ok(IndexStats {
      words: self.words.len(),
      by_type: by_type.into_iter().collect(),
    })
  }

  #[tracing::instrument(level = "trace", skip(self))]
  async fn clear_entity_type(&self, entity_type: EntityType) -> Result<ClearReport> {
    let mut report = ClearReport::default();
    self.associations.retain(|key, assoc| {
      if key.0 == entity_type {
        report.associations += assoc.len();
        false
      } else {
        true
      }
    });
    self.watermarks.retain(|key, _| {
      if key.0 == entity_type {
        report.watermarks += 1;
        false
      } else {
        true
      }
    });
    info!(
      entity_type = %entity_type,
      associations = report.associations,
      watermarks = report.watermarks,
      "Cleared search index"
    );
    Ok(report)
  }
}
