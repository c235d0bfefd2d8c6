//! Definition validation — an opt-in preflight before registering or running.
//!
//! Rules enforced:
//! 1. The definition id is non-empty and there is at least one step.
//! 2. Step IDs are unique within the definition (they key `outputs`).
//! 3. Retry settings are usable: attempt counts ≥ 1, a finite positive
//!    backoff multiplier.
//!
//! Returns the step IDs in execution order on success.  Registration does
//! not call this; an unknown action still surfaces as a step failure at run
//! time.

use std::collections::HashSet;

use crate::{models::WorkflowDefinition, EngineError};

/// Validate the definition's shape and return step IDs in execution order.
///
/// # Errors
/// - [`EngineError::EmptyWorkflowId`] / [`EngineError::NoSteps`] for empty definitions.
/// - [`EngineError::DuplicateStepId`] if two steps share an ID.
/// - [`EngineError::InvalidRetryPolicy`] for zero attempts or a bad multiplier.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
    if definition.id.trim().is_empty() {
        return Err(EngineError::EmptyWorkflowId);
    }
    if definition.steps.is_empty() {
        return Err(EngineError::NoSteps(definition.id.clone()));
    }

    let mut seen_ids: HashSet<&str> = HashSet::new();
    for step in &definition.steps {
        if !seen_ids.insert(step.id.as_str()) {
            return Err(EngineError::DuplicateStepId(step.id.clone()));
        }
        if step.retry_attempts == Some(0) {
            return Err(EngineError::InvalidRetryPolicy(format!(
                "step '{}' has retryAttempts = 0",
                step.id
            )));
        }
    }

    if let Some(policy) = &definition.retry_policy {
        if policy.max_attempts == Some(0) {
            return Err(EngineError::InvalidRetryPolicy("maxAttempts = 0".into()));
        }
        if let Some(m) = policy.backoff_multiplier {
            if !m.is_finite() || m <= 0.0 {
                return Err(EngineError::InvalidRetryPolicy(format!(
                    "backoffMultiplier must be a positive number, got {m}"
                )));
            }
        }
    }

    Ok(definition.steps.iter().map(|s| s.id.clone()).collect())
}
