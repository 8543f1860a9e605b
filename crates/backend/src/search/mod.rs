//! Incremental full-text search index.
//!
//! Text is split into lower-cased words, each word is resolved to an id in a
//! dictionary shared by every entity type, and the per-entity word counts are
//! written through a [`SearchStore`]. A watermark records when an entity was
//! last indexed successfully.
//!
//! ```text
//! text ─▶ tokenize ─▶ {word: count} ─▶ IndexWriter ─┬─▶ WordDictionary ─▶ get_or_create_word
//!                                                   ├─▶ upsert_association (overwrite)
//!                                                   ├─▶ prune_associations
//!                                                   └─▶ set_last_indexed
//! ```
//!
//! The query side ([`query`]) reads the same store for AND lookups, the admin
//! word list and statistics.

pub mod dictionary;
pub mod memory;
pub mod query;
pub mod store;
pub mod tokenizer;
pub mod writer;

use thiserror::Error;

pub use dictionary::{ResolveRetry, WordDictionary};
pub use memory::MemoryStore;
pub use query::{WordListPage, query_words, search_entities, word_list_page};
pub use store::{ClearReport, EntityTypeStats, IndexStats, SearchStore, StoreError, WordCount, WordListQuery};
pub use tokenizer::tokenize;
pub use writer::{IndexOutcome, IndexWriter};

#[derive(Error, Debug)]
pub enum IndexError {
  #[error("Store error: {0}")]
  Store(#[from] StoreError),
  #[error("Invalid input: {0}")]
  InvalidInput(String),
  #[error("Word '{word}' still conflicting after {attempts} attempts")]
  ConflictRetriesExhausted { word: String, attempts: u32 },
}
