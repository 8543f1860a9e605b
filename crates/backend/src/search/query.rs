//! Read side of the search index: AND lookups and the admin word list.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use super::{
  store::{Result, SearchStore, WordCount, WordListQuery},
  tokenizer::words,
};
use crate::domain::EntityType;

/// Distinct lower-cased words of a query string, in order of first appearance.
pub fn query_words(query: &str) -> Vec<String> {
  let mut seen = BTreeSet::new();
  words(query)
    .map(str::to_lowercase)
    .filter(|w| seen.insert(w.clone()))
    .collect()
}

/// Ids of `entity_type` entities containing every word of `query`, ascending.
///
/// The first word seeds the candidate set and each further word narrows it.
/// A word that was never indexed means nothing can match.
#[tracing::instrument(level = "trace", skip(store))]
pub async fn search_entities(store: &dyn SearchStore, entity_type: EntityType, query: &str) -> Result<Vec<i64>> {
  let terms = query_words(query);
  let mut matches: Option<Vec<i64>> = None;

  for term in &terms {
    let Some(word_id) = store.word_id(term).await? else {
      debug!(word = %term, "Query word not in dictionary");
      return Ok(Vec::new());
    };

    let ids = store.entities_with_word(entity_type, word_id).await?;
    let narrowed = match matches {
      None => ids,
      Some(previous) => previous.into_iter().filter(|id| ids.binary_search(id).is_ok()).collect(),
    };

    if narrowed.is_empty() {
      return Ok(narrowed);
    }
    matches = Some(narrowed);
  }

  Ok(matches.unwrap_or_default())
}

/// One page of the admin word list plus the total for pagination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordListPage {
  pub words: Vec<WordCount>,
  pub total: usize,
}

pub async fn word_list_page(store: &dyn SearchStore, query: &WordListQuery) -> Result<WordListPage> {
  let prefix = query.prefix.as_deref().map(str::to_lowercase);
  let query = WordListQuery {
    prefix: prefix.clone(),
    ..query.clone()
  };
  let words = store.word_list(&query).await?;
  let total = store.count_words(prefix.as_deref()).await?;
  Ok(WordListPage { words, total })
}
