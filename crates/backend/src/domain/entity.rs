use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kinds of content that carry a search index.
///
/// The string tags are what producers put on the wire and what the admin
/// surfaces accept. `linker-item` and `image-post` parse as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
  #[serde(rename = "comment")]
  Comment,
  #[serde(rename = "writing")]
  Writing,
  #[serde(rename = "linker", alias = "linker-item")]
  LinkerItem,
  #[serde(rename = "imagepost", alias = "image-post")]
  ImagePost,
}

impl EntityType {
  pub const ALL: [EntityType; 4] = [
    EntityType::Comment,
    EntityType::Writing,
    EntityType::LinkerItem,
    EntityType::ImagePost,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      EntityType::Comment => "comment",
      EntityType::Writing => "writing",
      EntityType::LinkerItem => "linker",
      EntityType::ImagePost => "imagepost",
    }
  }
}

impl fmt::Display for EntityType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid entity type: {0}")]
pub struct ParseEntityTypeError(pub String);

impl FromStr for EntityType {
  type Err = ParseEntityTypeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "comment" => Ok(EntityType::Comment),
      "writing" => Ok(EntityType::Writing),
      "linker" | "linker-item" => Ok(EntityType::LinkerItem),
      "imagepost" | "image-post" => Ok(EntityType::ImagePost),
      _ => Err(ParseEntityTypeError(s.to_string())),
    }
  }
}

/// Identifier of an entry in the shared word dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WordId(pub i64);

impl fmt::Display for WordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Marks that an entity's index reflects its content as of `indexed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
  pub indexed_at: DateTime<Utc>,
  /// Distinct words associated by the pass that set this watermark
  pub words: usize,
}
