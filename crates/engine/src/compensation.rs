//! Saga rollback.
//!
//! Walks the completed steps of a failed run from most recently completed
//! to first, invoking each step's compensation action once.  Compensation
//! is best effort: a failing compensation is recorded and the walk goes on.

use std::sync::Arc;

use actions::ActionRegistry;
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::models::{CompensationExecution, StepStatus, WorkflowDefinition, WorkflowExecution};
use crate::store::ExecutionStore;
use crate::EngineError;

#[derive(Debug, Clone)]
pub struct CompensationCoordinator {
    actions: Arc<ActionRegistry>,
    store: Arc<ExecutionStore>,
}

impl CompensationCoordinator {
    pub fn new(actions: Arc<ActionRegistry>, store: Arc<ExecutionStore>) -> Self {
        Self { actions, store }
    }

    /// Compensate every completed step of `execution` that declares a
    /// compensation, appending one `CompensationExecution` per attempt and
    /// saving the execution after each one.
    ///
    /// No retry and no timeout: each compensation runs once, to completion.
    ///
    /// Step records are paired with definition steps by position (the
    /// engine appends exactly one record per step, in order), so steps
    /// sharing an id still get their own compensation.
    ///
    /// # Errors
    /// [`EngineError::Internal`] if the records do not line up with the
    /// definition's steps.  Compensation failures themselves are not errors.
    #[instrument(skip_all, fields(execution_id = %execution.id))]
    pub async fn compensate(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
    ) -> Result<(), EngineError> {
        if execution.step_executions.len() > definition.steps.len() {
            return Err(EngineError::Internal(format!(
                "execution has {} step records but definition '{}' has {} steps",
                execution.step_executions.len(),
                definition.id,
                definition.steps.len()
            )));
        }

        let mut completed = Vec::new();
        for (record, step) in execution.step_executions.iter().zip(&definition.steps) {
            if record.step_id != step.id {
                return Err(EngineError::Internal(format!(
                    "step record '{}' does not match step '{}' of definition '{}'",
                    record.step_id, step.id, definition.id
                )));
            }
            if record.status == StepStatus::Completed {
                completed.push(step);
            }
        }

        for step in completed.into_iter().rev() {
            let step_id = step.id.as_str();

            let Some(compensation) = &step.compensation else {
                continue;
            };

            let started_at = Utc::now();
            let ctx = Arc::new(execution.context.clone());

            let record = match self.actions.get(&compensation.action_name) {
                None => CompensationExecution::failed(
                    step_id,
                    started_at,
                    format!("Action not found: {}", compensation.action_name),
                ),
                Some(handler) => {
                    let params = compensation.params.clone();
                    let task = tokio::spawn(async move { handler.execute(params, ctx).await });
                    match task.await {
                        Ok(Ok(result)) => CompensationExecution::completed(step_id, started_at, result),
                        Ok(Err(e)) => CompensationExecution::failed(step_id, started_at, e.to_string()),
                        Err(join_err) => CompensationExecution::failed(
                            step_id,
                            started_at,
                            format!("action task aborted: {join_err}"),
                        ),
                    }
                }
            };

            match &record.error {
                None => info!("compensated step '{}' via '{}'", step_id, compensation.action_name),
                Some(err) => warn!(
                    "compensation of step '{}' via '{}' failed: {}",
                    step_id, compensation.action_name, err
                ),
            }
            execution.compensations.push(record);
            self.store.save(execution);
        }

        Ok(())
    }
}
