//! Workflow definitions by id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::models::WorkflowDefinition;

/// Holds immutable workflow definitions keyed by `definition.id`.
///
/// Like [`actions::ActionRegistry`], this is an explicitly constructed
/// object injected into the engine rather than process-global state.
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    definitions: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a definition.  Re-registering an id replaces the old definition.
    pub fn register(&self, definition: WorkflowDefinition) {
        let id = definition.id.clone();
        let steps = definition.steps.len();
        let mut definitions = self.definitions.write().unwrap_or_else(|p| p.into_inner());
        if definitions.insert(id.clone(), Arc::new(definition)).is_some() {
            debug!("workflow '{}' re-registered, previous definition replaced", id);
        }
        info!("registered workflow '{}' ({} steps)", id, steps);
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        definitions.get(id).cloned()
    }

    /// Registered definition ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let definitions = self.definitions.read().unwrap_or_else(|p| p.into_inner());
        let mut ids: Vec<String> = definitions.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkflowStep;

    #[test]
    fn register_and_get() {
        let registry = WorkflowRegistry::new();
        registry.register(WorkflowDefinition::new("a", "A", vec![WorkflowStep::new("s", "x")]));
        assert_eq!(registry.get("a").unwrap().name, "A");
        assert!(registry.get("b").is_none());
        assert_eq!(registry.ids(), vec!["a"]);
    }

    #[test]
    fn second_registration_replaces_first() {
        let registry = WorkflowRegistry::new();
        registry.register(WorkflowDefinition::new("a", "first", vec![]));
        registry.register(WorkflowDefinition::new("a", "second", vec![]));
        assert_eq!(registry.get("a").unwrap().name, "second");
        assert_eq!(registry.ids().len(), 1);
    }
}
