//! Engine-level error types.

use actions::ActionError;
use thiserror::Error;

/// Errors produced by the workflow engine (configuration, validation and
/// engine-internal faults).
///
/// Business failures of a step are never returned as `EngineError` from
/// `execute_workflow`; they end up in the execution record instead.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Configuration errors ------

    /// `execute_workflow` was called with an id nobody registered.
    #[error("Workflow definition not found: {0}")]
    WorkflowNotFound(String),

    // ------ Validation errors ------

    #[error("workflow definition id must not be empty")]
    EmptyWorkflowId,

    #[error("workflow '{0}' has no steps")]
    NoSteps(String),

    /// Two or more steps share the same ID.
    #[error("duplicate step ID: '{0}'")]
    DuplicateStepId(String),

    #[error("invalid retry configuration: {0}")]
    InvalidRetryPolicy(String),

    /// A step (or its compensation) names an action that is not registered.
    #[error("step '{step_id}' references unknown action '{action}'")]
    UnknownAction { step_id: String, action: String },

    // ------ Engine-internal errors ------

    /// A step's condition predicate panicked while being evaluated.
    #[error("condition of step '{step_id}' panicked: {message}")]
    ConditionPanicked { step_id: String, message: String },

    /// Bookkeeping found the execution record out of sync with its definition.
    #[error("internal engine error: {0}")]
    Internal(String),
}

/// Why a single step gave up after its attempts were exhausted.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step's action is not registered; never retried.
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    /// The attempt lost the race against the step timeout.
    #[error("Step timeout")]
    Timeout,

    /// The handler returned an error.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The handler task panicked or was aborted by the runtime.
    #[error("action task aborted: {0}")]
    Aborted(String),
}
