use std::{collections::BTreeMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::EntityType;
use crate::capability::Task;

/// Whether the action that produced an event succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
  #[default]
  Success,
  Failure,
}

impl Outcome {
  pub fn is_success(self) -> bool {
    matches!(self, Outcome::Success)
  }
}

/// One thing to index: which entity, and the text it currently holds.
///
/// A missing type, a zero id, or empty text means there is nothing to index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEventData {
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub entity_type: Option<EntityType>,
  pub id: i64,
  pub text: String,
}

impl IndexEventData {
  pub fn new(entity_type: EntityType, id: i64, text: impl Into<String>) -> Self {
    Self {
      entity_type: Some(entity_type),
      id,
      text: text.into(),
    }
  }

  /// Same instruction, with `fallback` filled in when no type was given.
  pub fn with_default_type(mut self, fallback: EntityType) -> Self {
    self.entity_type.get_or_insert(fallback);
    self
  }

  pub fn is_indexable(&self) -> bool {
    self.entity_type.is_some() && self.id != 0 && !self.text.is_empty()
  }
}

/// Index instructions attached by the producer at publish time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexPayload {
  Single(IndexEventData),
  Bulk(Vec<IndexEventData>),
}

impl IndexPayload {
  /// Flatten either shape into an instruction list.
  pub fn instructions(&self) -> Vec<IndexEventData> {
    match self {
      IndexPayload::Single(item) => vec![item.clone()],
      IndexPayload::Bulk(items) => items.clone(),
    }
  }

  pub fn len(&self) -> usize {
    match self {
      IndexPayload::Single(_) => 1,
      IndexPayload::Bulk(items) => items.len(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// Side-channel values a handler attaches for downstream consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventData {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub index: Option<IndexPayload>,
  /// Display name of the acting user
  #[serde(skip_serializing_if = "Option::is_none")]
  pub actor: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub link_url: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub target_user_ids: Vec<i32>,
  /// Template-only values
  #[serde(skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventData {
  pub fn with_index(mut self, payload: IndexPayload) -> Self {
    self.index = Some(payload);
    self
  }

  pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
    self.actor = Some(actor.into());
    self
  }

  pub fn with_link_url(mut self, url: impl Into<String>) -> Self {
    self.link_url = Some(url.into());
    self
  }

  pub fn with_targets(mut self, user_ids: impl IntoIterator<Item = i32>) -> Self {
    self.target_user_ids.extend(user_ids);
    self
  }

  pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
    self.extra.insert(key.into(), value);
    self
  }
}

/// The unit published on the bus once a handler's action has run.
#[derive(Debug, Clone)]
pub struct TaskEvent {
  pub id: Uuid,
  pub time: DateTime<Utc>,
  /// Request path that produced the event
  pub path: String,
  /// Acting user, 0 when anonymous
  pub user_id: i32,
  pub task: Arc<dyn Task>,
  pub outcome: Outcome,
  pub data: EventData,
}

impl TaskEvent {
  pub fn new(task: Arc<dyn Task>, outcome: Outcome, data: EventData) -> Self {
    Self {
      id: Uuid::now_v7(),
      time: Utc::now(),
      path: String::new(),
      user_id: 0,
      task,
      outcome,
      data,
    }
  }

  pub fn success(task: Arc<dyn Task>, data: EventData) -> Self {
    Self::new(task, Outcome::Success, data)
  }

  pub fn with_path(mut self, path: impl Into<String>) -> Self {
    self.path = path.into();
    self
  }

  pub fn with_user(mut self, user_id: i32) -> Self {
    self.user_id = user_id;
    self
  }

  pub fn task_name(&self) -> &str {
    self.task.name()
  }
}
