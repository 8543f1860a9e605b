//! Capability dispatch: how a published task says what processing it supports.
//!
//! A [`Task`] exposes each optional capability through an accessor that
//! returns `None` by default. Consumers ask for the capability they handle
//! and silently skip tasks that don't have it, so a handler publishing an
//! event never needs to know which consumers exist.
//!
//! ```text
//! TaskEvent.task ──▶ indexing()                 ──▶ SearchWorker
//!                ├─▶ subscriber_notifications() ──┐
//!                ├─▶ admin_notifications()      ──┤
//!                ├─▶ self_notifications()       ──┼▶ NotificationWorker
//!                └─▶ targeted_notifications()   ──┘
//! ```

pub mod catalog;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use registry::{MISSING_TASK_NAME, MissingTask, TaskRegistry};

use crate::domain::{EntityType, EventData, IndexEventData, IndexPayload, TaskEvent};

// ============================================================================
// Task
// ============================================================================

/// A user action that can be published on the bus.
pub trait Task: Send + Sync + fmt::Debug {
  /// Stable identifier, e.g. `linker.approve`
  fn name(&self) -> &str;

  fn indexing(&self) -> Option<&dyn IndexedTask> {
    None
  }

  fn subscriber_notifications(&self) -> Option<&dyn SubscriberNotifications> {
    None
  }

  fn admin_notifications(&self) -> Option<&dyn AdminNotifications> {
    None
  }

  fn targeted_notifications(&self) -> Option<&dyn TargetedNotifications> {
    None
  }

  fn self_notifications(&self) -> Option<&dyn SelfNotifications> {
    None
  }

  fn capabilities(&self) -> CapabilitySet {
    let mut set = CapabilitySet::EMPTY;
    if self.indexing().is_some() {
      set = set | CapabilitySet::INDEXING;
    }
    if self.subscriber_notifications().is_some() {
      set = set | CapabilitySet::SUBSCRIBERS;
    }
    if self.admin_notifications().is_some() {
      set = set | CapabilitySet::ADMINS;
    }
    if self.targeted_notifications().is_some() {
      set = set | CapabilitySet::TARGETED;
    }
    if self.self_notifications().is_some() {
      set = set | CapabilitySet::SELF;
    }
    set
  }
}

// ============================================================================
// Capabilities
// ============================================================================

/// The task's events carry content for the search index.
pub trait IndexedTask: Send + Sync {
  /// Entity type used when an instruction doesn't name one
  fn index_type(&self) -> EntityType;

  /// Index instructions carried by an event's data.
  fn index_data(&self, data: &EventData) -> Vec<IndexEventData> {
    data.index.as_ref().map(IndexPayload::instructions).unwrap_or_default()
  }
}

/// Users subscribed to the task's path hear about it.
pub trait SubscriberNotifications: Send + Sync {
  /// `None` suppresses the notice for this event
  fn subscriber_template(&self, event: &TaskEvent) -> Option<NotificationTemplate>;
}

/// Site administrators hear about it.
pub trait AdminNotifications: Send + Sync {
  fn admin_template(&self, event: &TaskEvent) -> Option<NotificationTemplate>;
}

/// Specific users named by the event hear about it.
pub trait TargetedNotifications: Send + Sync {
  fn target_user_ids(&self, event: &TaskEvent) -> Vec<i32> {
    event.data.target_user_ids.clone()
  }

  fn target_template(&self, event: &TaskEvent) -> Option<NotificationTemplate>;
}

/// The acting user hears about their own action. Anonymous events
/// (`user_id == 0`) have nobody to tell.
pub trait SelfNotifications: Send + Sync {
  fn self_template(&self, event: &TaskEvent) -> Option<NotificationTemplate>;
}

/// Names the templates a notice is rendered with. Rendering happens in the
/// delivery layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTemplate {
  pub email: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub internal: Option<String>,
}

impl NotificationTemplate {
  pub fn email(name: impl Into<String>) -> Self {
    Self {
      email: name.into(),
      internal: None,
    }
  }

  pub fn with_internal(mut self, name: impl Into<String>) -> Self {
    self.internal = Some(name.into());
    self
  }
}

// ============================================================================
// CapabilitySet
// ============================================================================

/// Compact summary of which capabilities a task exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
  pub const EMPTY: Self = Self(0);
  pub const INDEXING: Self = Self(1);
  pub const SUBSCRIBERS: Self = Self(1 << 1);
  pub const ADMINS: Self = Self(1 << 2);
  pub const TARGETED: Self = Self(1 << 3);
  pub const SELF: Self = Self(1 << 4);

  const NAMED: [(Self, &'static str); 5] = [
    (Self::INDEXING, "indexing"),
    (Self::SUBSCRIBERS, "subscribers"),
    (Self::ADMINS, "admins"),
    (Self::TARGETED, "targeted"),
    (Self::SELF, "self"),
  ];

  pub fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  pub fn is_empty(self) -> bool {
    self.0 == 0
  }

  pub fn names(self) -> Vec<&'static str> {
    Self::NAMED
      .iter()
      .filter(|(flag, _)| self.contains(*flag))
      .map(|(_, name)| *name)
      .collect()
  }
}

impl std::ops::BitOr for CapabilitySet {
  type Output = Self;

  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl fmt::Display for CapabilitySet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return f.write_str("none");
    }
    f.write_str(&self.names().join(","))
  }
}
