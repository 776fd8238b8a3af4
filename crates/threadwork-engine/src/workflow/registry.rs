//! Holds workflow definitions by unique name, indexed by trigger event
//! type.

use std::collections::HashMap;
use std::fmt;

use super::definition::WorkflowDefinition;

/// `register(def)` inserts by name; registering a name twice overwrites
/// and logs a warning. `findByEventType` returns all defs whose
/// `triggers.event_types` contain the given type, in no particular
/// order — the resolver is responsible for sorting.
pub struct WorkflowRegistry {
    by_name: HashMap<String, WorkflowDefinition>,
    by_event_type: HashMap<&'static str, Vec<String>>,
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            by_event_type: HashMap::new(),
        }
    }

    #[tracing::instrument(skip(self, def), fields(name = %def.name))]
    pub fn register(&mut self, def: WorkflowDefinition) {
        if self.by_name.contains_key(&def.name) {
            tracing::warn!(name = %def.name, "overwriting previously registered workflow");
            self.remove_from_index(&def.name);
        }
        for event_type in def.triggers.event_types.iter().copied() {
            self.by_event_type
                .entry(event_type)
                .or_default()
                .push(def.name.clone());
        }
        self.by_name.insert(def.name.clone(), def);
    }

    fn remove_from_index(&mut self, name: &str) {
        for names in self.by_event_type.values_mut() {
            names.retain(|n| n != name);
        }
    }

    pub fn get_by_name(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.by_name.get(name)
    }

    /// Returns all definitions whose `triggers.event_types` contain
    /// `event_type`. Order is unspecified; callers that need priority
    /// ordering should go through [`crate::workflow::WorkflowResolver`].
    pub fn find_by_event_type(&self, event_type: &str) -> Vec<&WorkflowDefinition> {
        self.by_event_type
            .get(event_type)
            .map(|names| names.iter().filter_map(|n| self.by_name.get(n)).collect())
            .unwrap_or_default()
    }

    /// Asserts registry-wide invariants: unique names (guaranteed by
    /// construction via `HashMap`) and non-empty `event_types` per
    /// definition.
    pub fn validate(&self) -> Result<(), String> {
        for def in self.by_name.values() {
            if def.triggers.event_types.is_empty() {
                return Err(format!("workflow '{}' has no trigger event types", def.name));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn workflow_names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(|s| s.as_str())
    }
}

impl fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("registered", &self.workflow_names().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{WorkflowDefinition, WorkflowResult};

    fn noop_def(name: &str, event_type: &'static str, priority: i32) -> WorkflowDefinition {
        WorkflowDefinition::builder(name, "test workflow")
            .on_event(event_type)
            .priority(priority)
            .build(|_event, context, _emitter| {
                Box::pin(async move { WorkflowResult::success(context, None) })
            })
    }

    #[test]
    fn register_and_find_by_event_type() {
        let mut registry = WorkflowRegistry::new();
        registry.register(noop_def("w1", "DATA_ARRIVED", 0));
        registry.register(noop_def("w2", "ISSUE_CREATED", 0));

        let matches = registry.find_by_event_type("DATA_ARRIVED");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "w1");
        assert!(registry.find_by_event_type("UNKNOWN").is_empty());
    }

    #[test]
    fn re_registering_overwrites_and_reindexes() {
        let mut registry = WorkflowRegistry::new();
        registry.register(noop_def("w1", "DATA_ARRIVED", 0));
        registry.register(noop_def("w1", "ISSUE_CREATED", 5));

        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_event_type("DATA_ARRIVED").is_empty());
        assert_eq!(registry.find_by_event_type("ISSUE_CREATED").len(), 1);
    }

    #[test]
    fn validate_catches_empty_event_types() {
        let mut registry = WorkflowRegistry::new();
        let def = WorkflowDefinition {
            name: "broken".into(),
            description: "".into(),
            triggers: crate::workflow::definition::Triggers {
                event_types: Default::default(),
                condition: None,
                priority: 0,
            },
            executor: std::sync::Arc::new(|_event, context, _emitter| {
                Box::pin(async move { WorkflowResult::success(context, None) })
            }),
        };
        registry.by_name.insert(def.name.clone(), def);
        assert!(registry.validate().is_err());
    }

    #[test]
    fn empty_registry_returns_empty_vec() {
        let registry = WorkflowRegistry::new();
        assert!(registry.find_by_event_type("DATA_ARRIVED").is_empty());
    }
}
