use std::{collections::BTreeMap, sync::Arc};

use tracing::warn;

use super::{Task, catalog};

/// Name carried by events whose task could not be found.
pub const MISSING_TASK_NAME: &str = "MISSING";

/// Placeholder task for names that are not registered. It has no capabilities.
#[derive(Debug, Default, Clone, Copy)]
pub struct MissingTask;

impl Task for MissingTask {
  fn name(&self) -> &str {
    MISSING_TASK_NAME
  }
}

/// Task kinds known to the process, keyed by name.
///
/// Built once at startup; lookups are read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
  tasks: BTreeMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// A registry holding every task in [`catalog`].
  pub fn with_catalog() -> Self {
    let mut registry = Self::new();
    for task in catalog::all() {
      registry.register(task);
    }
    registry
  }

  /// Register a task under its own name, replacing any previous entry.
  pub fn register(&mut self, task: Arc<dyn Task>) -> Option<Arc<dyn Task>> {
    let name = task.name().to_string();
    let previous = self.tasks.insert(name.clone(), task);
    if previous.is_some() {
      warn!(task = %name, "Task registered twice, keeping the latest");
    }
    previous
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
    self.tasks.get(name).cloned()
  }

  /// Like [`get`](Self::get), but unknown names resolve to [`MissingTask`].
  pub fn resolve(&self, name: &str) -> Arc<dyn Task> {
    match self.get(name) {
      Some(task) => task,
      None => {
        warn!(task = %name, "Unknown task name");
        Arc::new(MissingTask)
      }
    }
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Task>)> {
    self.tasks.iter().map(|(name, task)| (name.as_str(), task))
  }

  pub fn len(&self) -> usize {
    self.tasks.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::capability::CapabilitySet;

  #[test]
  fn test_catalog_registry_lookup() {
    let registry = TaskRegistry::with_catalog();
    assert!(!registry.is_empty());

    let approve = registry.get("linker.approve").unwrap();
    assert_eq!(approve.name(), "linker.approve");
    assert!(approve.capabilities().contains(CapabilitySet::INDEXING | CapabilitySet::ADMINS));
    assert!(registry.get("nope").is_none());
  }

  #[test]
  fn test_unknown_name_resolves_to_missing() {
    let registry = TaskRegistry::with_catalog();
    let task = registry.resolve("does.not.exist");
    assert_eq!(task.name(), MISSING_TASK_NAME);
    assert!(task.capabilities().is_empty());
  }

  #[test]
  fn test_register_replaces() {
    let mut registry = TaskRegistry::new();
    assert!(registry.register(Arc::new(MissingTask)).is_none());
    assert!(registry.register(Arc::new(MissingTask)).is_some());
    assert_eq!(registry.len(), 1);
  }

  #[test]
  fn test_iter_is_sorted_by_name() {
    let registry = TaskRegistry::with_catalog();
    let names: Vec<&str> = registry.iter().map(|(name, _)| name).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
  }
}
