//! Word splitting and frequency counting for the search index.
//!
//! A word is a maximal run of letters, digits, apostrophes and hyphens.
//! Everything else separates words and is discarded. Words are lower-cased
//! before counting, so "Go" and "go" are the same word.

use std::collections::HashMap;

/// Whether `c` can appear inside a word.
pub fn is_word_char(c: char) -> bool {
  c.is_alphabetic() || c.is_numeric() || c == '\'' || c == '-'
}

/// Raw words of `text` in order of appearance, before case folding.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
  text.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

/// Count occurrences of each lower-cased word in `text`.
pub fn tokenize(text: &str) -> HashMap<String, u32> {
  let mut counts = HashMap::new();
  for word in words(text) {
    *counts.entry(word.to_lowercase()).or_insert(0) += 1;
  }
  counts
}
