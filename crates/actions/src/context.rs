//! The per-run context every action and step condition can read.
//!
//! Defined here (in the actions crate) so both the engine and individual
//! action implementations can import it without a circular dependency.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form parameters handed to an action.  Each action interprets its
/// own shape.
pub type Params = Map<String, Value>;

/// Shared state of one workflow run.
///
/// `data` is the caller-supplied input and is read-only by convention.
/// `outputs` accumulates step results keyed by step id; only the engine
/// writes to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowContext {
    pub workflow_id: String,
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub data: Params,
    #[serde(default)]
    pub outputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Params>,
}

impl WorkflowContext {
    pub fn new(workflow_id: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            correlation_id: correlation_id.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set one input value.
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, metadata: Params) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Result recorded by a completed step, if any.
    pub fn output(&self, step_id: &str) -> Option<&Value> {
        self.outputs.get(step_id)
    }
}
