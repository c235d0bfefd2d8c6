//! Workflow execution engine.
//!
//! `WorkflowEngine` is the central orchestrator:
//! 1. Looks up the definition and creates a `pending` execution record.
//! 2. Publishes `workflow.started` and moves the run to `running`.
//! 3. Walks the steps in definition order, skipping those whose condition
//!    is false and running the rest through the `StepExecutor`.
//! 4. On the first step that gives up, compensates the completed steps in
//!    reverse order and finishes as `compensated`.
//! 5. Otherwise finishes as `completed`.
//!
//! Business failures never leave this module as `Err`; they are recorded in
//! the returned `WorkflowExecution`.  Only an unknown definition id is an
//! error for the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use actions::{ActionHandler, ActionRegistry, WorkflowContext};
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::compensation::CompensationCoordinator;
use crate::config::EngineConfig;
use crate::events::{EventBus, EventNotifier};
use crate::models::{
    ExecutionStatus, StepExecution, WorkflowDefinition, WorkflowExecution, WorkflowStep,
};
use crate::registry::WorkflowRegistry;
use crate::step::StepExecutor;
use crate::store::ExecutionStore;
use crate::validate::validate_definition;
use crate::EngineError;

/// In-process saga executor.
///
/// Cheap to clone; clones share registries, store and event bus, so
/// several runs can be driven concurrently from different tasks.  Each run
/// owns its own `WorkflowContext`.
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    actions: Arc<ActionRegistry>,
    workflows: Arc<WorkflowRegistry>,
    store: Arc<ExecutionStore>,
    steps: StepExecutor,
    compensator: CompensationCoordinator,
    notifier: EventNotifier,
    config: EngineConfig,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl WorkflowEngine {
    /// An engine with its own empty registries.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registries(
            Arc::new(ActionRegistry::new()),
            Arc::new(WorkflowRegistry::new()),
            config,
        )
    }

    /// An engine over externally owned registries.
    pub fn with_registries(
        actions: Arc<ActionRegistry>,
        workflows: Arc<WorkflowRegistry>,
        config: EngineConfig,
    ) -> Self {
        let store = Arc::new(ExecutionStore::new());
        Self {
            steps: StepExecutor::new(Arc::clone(&actions), config.clone()),
            compensator: CompensationCoordinator::new(Arc::clone(&actions), Arc::clone(&store)),
            notifier: EventNotifier::new(None, config.event_source.clone()),
            store,
            actions,
            workflows,
            config,
        }
    }

    /// Publish lifecycle events to `bus`.
    pub fn with_event_bus(mut self, bus: Arc<dyn EventBus>) -> Self {
        self.notifier = EventNotifier::new(Some(bus), self.config.event_source.clone());
        self
    }

    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }

    pub fn workflows(&self) -> &Arc<WorkflowRegistry> {
        &self.workflows
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register (or replace) a workflow definition.
    pub fn register_workflow(&self, definition: WorkflowDefinition) {
        self.workflows.register(definition);
    }

    /// Register (or replace) an action handler.
    pub fn register_action(&self, name: impl Into<String>, handler: impl ActionHandler + 'static) {
        self.actions.register(name, handler);
    }

    /// Structural validation plus a check that every referenced action is
    /// registered.  Returns the step IDs in execution order.
    pub fn validate_workflow(&self, definition: &WorkflowDefinition) -> Result<Vec<String>, EngineError> {
        let order = validate_definition(definition)?;
        for step in &definition.steps {
            let referenced = std::iter::once(&step.action_name)
                .chain(step.compensation.as_ref().map(|c| &c.action_name));
            for action in referenced {
                if !self.actions.contains(action) {
                    return Err(EngineError::UnknownAction {
                        step_id: step.id.clone(),
                        action: action.clone(),
                    });
                }
            }
        }
        Ok(order)
    }

    pub fn get_execution(&self, id: &Uuid) -> Option<WorkflowExecution> {
        self.store.get(id)
    }

    /// Executions of `definition_id`, newest first.  `limit` defaults to
    /// `EngineConfig::history_limit`.
    pub fn get_execution_history(&self, definition_id: &str, limit: Option<usize>) -> Vec<WorkflowExecution> {
        self.store
            .history(definition_id, limit.unwrap_or(self.config.history_limit))
    }

    /// Run `definition_id` to a terminal state and return the finished record.
    ///
    /// # Errors
    /// Only [`EngineError::WorkflowNotFound`], before any record is created.
    /// Step failures produce `Ok` with status `compensated`; engine-internal
    /// faults produce `Ok` with status `failed`.
    #[instrument(skip(self, context), fields(execution_id = tracing::field::Empty))]
    pub async fn execute_workflow(
        &self,
        definition_id: &str,
        context: WorkflowContext,
    ) -> Result<WorkflowExecution, EngineError> {
        let definition = self
            .workflows
            .get(definition_id)
            .ok_or_else(|| EngineError::WorkflowNotFound(definition_id.to_string()))?;

        let mut execution = WorkflowExecution::new(definition_id, context);
        tracing::Span::current().record("execution_id", tracing::field::display(execution.id));
        self.store.save(&execution);

        self.notifier.started(&execution).await;
        execution.status = ExecutionStatus::Running;
        self.store.save(&execution);
        info!(
            "workflow '{}' v{} started ({} steps)",
            definition.id,
            definition.version,
            definition.steps.len()
        );

        // Top-level guard: anything escaping the per-step failure handling
        // marks the run `failed` and skips compensation.
        if let Err(err) = self.run_steps(&definition, &mut execution).await {
            error!("workflow '{}' aborted by engine error: {}", definition.id, err);
            execution.finish(ExecutionStatus::Failed, Some(err.to_string()));
            self.store.save(&execution);
            self.notifier.failed(&execution).await;
        }

        Ok(execution)
    }

    async fn run_steps(
        &self,
        definition: &WorkflowDefinition,
        execution: &mut WorkflowExecution,
    ) -> Result<(), EngineError> {
        for step in &definition.steps {
            if !Self::should_run(step, &execution.context)? {
                info!("step '{}' skipped (condition false)", step.id);
                execution.step_executions.push(StepExecution::skipped(&step.id));
                self.store.save(execution);
                continue;
            }

            let started_at = Utc::now();
            let ctx = Arc::new(execution.context.clone());

            match self
                .steps
                .execute(step, ctx, definition.retry_policy.as_ref())
                .await
            {
                Ok(result) => {
                    info!("step '{}' completed", step.id);
                    execution
                        .step_executions
                        .push(StepExecution::completed(&step.id, started_at, result.clone()));
                    execution.context.outputs.insert(step.id.clone(), result);
                    self.store.save(execution);
                }

                Err(step_err) => {
                    let message = step_err.to_string();
                    warn!("step '{}' failed: {}", step.id, message);
                    execution
                        .step_executions
                        .push(StepExecution::failed(&step.id, started_at, message.clone()));
                    execution.status = ExecutionStatus::Compensating;
                    self.store.save(execution);

                    self.compensator.compensate(definition, execution).await?;

                    execution.finish(
                        ExecutionStatus::Compensated,
                        Some(format!("Step {} failed: {}", step.id, message)),
                    );
                    self.store.save(execution);
                    info!(
                        "workflow '{}' compensated ({} compensation(s) attempted)",
                        definition.id,
                        execution.compensations.len()
                    );
                    self.notifier.failed(execution).await;
                    return Ok(());
                }
            }
        }

        execution.finish(ExecutionStatus::Completed, None);
        self.store.save(execution);
        info!("workflow '{}' completed", definition.id);
        self.notifier.completed(execution).await;
        Ok(())
    }

    /// Evaluate the step's condition.  A panicking predicate is an engine
    /// error, not a step failure.
    fn should_run(step: &WorkflowStep, ctx: &WorkflowContext) -> Result<bool, EngineError> {
        let Some(condition) = &step.condition else {
            return Ok(true);
        };

        catch_unwind(AssertUnwindSafe(|| condition.evaluate(ctx))).map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            EngineError::ConditionPanicked {
                step_id: step.id.clone(),
                message,
            }
        })
    }
}
