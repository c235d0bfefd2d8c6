//! Name → handler lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::ActionHandler;

/// Maps action names to shared `ActionHandler` implementations.
///
/// Registries are explicitly constructed and injected into an engine, so
/// several engines with different action sets can live side by side.
/// Register everything before the first run; lookups during a run see
/// whatever is registered at the moment of the lookup.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `handler` under `name`, replacing any previous handler.
    pub fn register(&self, name: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.register_arc(name, Arc::new(handler));
    }

    /// Same as [`register`](Self::register) for an already shared handler.
    pub fn register_arc(&self, name: impl Into<String>, handler: Arc<dyn ActionHandler>) {
        let name = name.into();
        let mut handlers = self.handlers.write().unwrap_or_else(|p| p.into_inner());
        if handlers.insert(name.clone(), handler).is_some() {
            debug!("action '{}' re-registered, previous handler replaced", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ActionHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(|p| p.into_inner());
        handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|p| p.into_inner());
        handlers.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<String> {
        let handlers = self.handlers.read().unwrap_or_else(|p| p.into_inner());
        let mut names: Vec<String> = handlers.keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockAction;
    use crate::WorkflowContext;
    use serde_json::json;

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = ActionRegistry::new();
        registry.register("charge", MockAction::returning(json!("first")));
        registry.register("charge", MockAction::returning(json!("second")));

        let handler = registry.get("charge").expect("registered");
        let out = handler
            .execute(Default::default(), Arc::new(WorkflowContext::default()))
            .await
            .unwrap();
        assert_eq!(out, json!("second"));
    }

    #[test]
    fn unknown_action_is_none() {
        let registry = ActionRegistry::new();
        assert!(registry.get("ghost").is_none());
        assert!(!registry.contains("ghost"));
    }

    #[test]
    fn names_are_sorted() {
        let registry = ActionRegistry::new();
        registry.register("ship", MockAction::returning(json!(null)));
        registry.register("charge", MockAction::returning(json!(null)));
        assert_eq!(registry.names(), vec!["charge", "ship"]);
    }
}
