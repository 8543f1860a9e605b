//! Query commands (search, words)

use anyhow::Result;
use taskbus::{
  RuntimeConfig,
  search::{WordListQuery, query_words, search_entities, word_list_page},
};

use super::{open_store, parse_entity_type};

/// AND query over one entity type
pub async fn cmd_search(runtime_config: &RuntimeConfig, entity_type: &str, query: &str, json: bool) -> Result<()> {
  let entity_type = parse_entity_type(entity_type)?;
  let store = open_store(runtime_config).await?;
  let ids = search_entities(store.as_ref(), entity_type, query).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&ids)?);
    return Ok(());
  }

  let terms = query_words(query);
  if ids.is_empty() {
    println!("No {} entities contain: {}", entity_type, terms.join(" "));
    return Ok(());
  }

  println!("{} {} match(es) for: {}", ids.len(), entity_type, terms.join(" "));
  for id in &ids {
    println!("  {}", id);
  }
  Ok(())
}

/// Word list with usage counts
pub async fn cmd_words(
  runtime_config: &RuntimeConfig,
  prefix: Option<String>,
  limit: usize,
  offset: usize,
  json: bool,
) -> Result<()> {
  let store = open_store(runtime_config).await?;
  let query = WordListQuery { prefix, limit, offset };
  let page = word_list_page(store.as_ref(), &query).await?;

  if json {
    println!("{}", serde_json::to_string_pretty(&page)?);
    return Ok(());
  }

  if page.words.is_empty() {
    println!("No words ({} total).", page.total);
    return Ok(());
  }

  println!("{:<24} COUNT", "WORD");
  for entry in &page.words {
    println!("{:<24} {}", entry.word, entry.count);
  }
  println!(
    "\nShowing {}-{} of {}",
    offset + 1,
    offset + page.words.len(),
    page.total
  );
  Ok(())
}
