//! Core domain models for the saga engine.
//!
//! Definitions (`WorkflowDefinition`, `WorkflowStep`, `RetryPolicy`) are
//! immutable templates.  Executions (`WorkflowExecution` and its step and
//! compensation records) are the per-run state the engine produces.  All of
//! them serialise to camelCase JSON.

use std::sync::Arc;

use actions::{Params, WorkflowContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// StepCondition
// ---------------------------------------------------------------------------

/// Pure, synchronous predicate deciding whether a step runs.
///
/// Evaluated against the context as it stands when the step is reached, so
/// it can look at earlier steps' `outputs`.
#[derive(Clone)]
pub struct StepCondition(Arc<dyn Fn(&WorkflowContext) -> bool + Send + Sync>);

impl StepCondition {
    pub fn new(f: impl Fn(&WorkflowContext) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn evaluate(&self, ctx: &WorkflowContext) -> bool {
        (self.0)(ctx)
    }
}

impl std::fmt::Debug for StepCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StepCondition(..)")
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// Undo action for a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compensation {
    pub action_name: String,
    #[serde(default)]
    pub params: Params,
}

/// A single step of a saga.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStep {
    /// Unique identifier within the definition; keys `outputs`.
    pub id: String,
    pub name: String,
    /// Maps to a registered `ActionHandler`.
    pub action_name: String,
    #[serde(default)]
    pub params: Params,
    /// Overrides the definition's `retry_policy.max_attempts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Code-only; not representable in JSON definitions.
    #[serde(skip)]
    pub condition: Option<StepCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compensation: Option<Compensation>,
}

impl WorkflowStep {
    /// A step whose display name defaults to its id.
    pub fn new(id: impl Into<String>, action_name: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            action_name: action_name.into(),
            params: Params::new(),
            retry_attempts: None,
            timeout_ms: None,
            condition: None,
            compensation: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = Some(attempts);
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Only run this step when `f` returns true.
    pub fn when(mut self, f: impl Fn(&WorkflowContext) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(StepCondition::new(f));
        self
    }

    pub fn compensate_with(mut self, action_name: impl Into<String>, params: Params) -> Self {
        self.compensation = Some(Compensation {
            action_name: action_name.into(),
            params,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// Definition-wide retry settings.  Unset fields fall back to `EngineConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backoff_multiplier: Option<f64>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay_ms: Some(delay_ms),
            backoff_multiplier: Some(backoff_multiplier),
        }
    }
}

/// A complete, immutable saga template.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Executed strictly in this order.
    pub steps: Vec<WorkflowStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_policy: Option<RetryPolicy>,
    #[serde(default)]
    pub metadata: Params,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl WorkflowDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<WorkflowStep>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: default_version(),
            steps,
            retry_policy: None,
            metadata: Params::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = Some(policy);
        self
    }
}

// ---------------------------------------------------------------------------
// Statuses
// ---------------------------------------------------------------------------

/// Lifecycle of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    /// Every step completed or was skipped.
    Completed,
    /// Engine-internal error; no compensation was attempted.
    Failed,
    Compensating,
    /// A step failed and rollback ran (possibly only partially successful).
    Compensated,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Compensated)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending      => write!(f, "pending"),
            Self::Running      => write!(f, "running"),
            Self::Completed    => write!(f, "completed"),
            Self::Failed       => write!(f, "failed"),
            Self::Compensating => write!(f, "compensating"),
            Self::Compensated  => write!(f, "compensated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompensationStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

// ---------------------------------------------------------------------------
// Execution records
// ---------------------------------------------------------------------------

/// Outcome of one step within one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepExecution {
    pub step_id: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepExecution {
    pub fn skipped(step_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            step_id: step_id.into(),
            status: StepStatus::Skipped,
            start_time: now,
            end_time: now,
            attempts: 0,
            result: None,
            error: None,
        }
    }

    pub fn completed(step_id: impl Into<String>, start_time: DateTime<Utc>, result: Value) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Completed,
            start_time,
            end_time: Utc::now(),
            attempts: 1,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, start_time: DateTime<Utc>, error: String) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Failed,
            start_time,
            end_time: Utc::now(),
            attempts: 1,
            result: None,
            error: Some(error),
        }
    }
}

/// Outcome of one compensation attempt during rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensationExecution {
    pub step_id: String,
    pub status: CompensationStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompensationExecution {
    pub fn completed(step_id: impl Into<String>, start_time: DateTime<Utc>, result: Value) -> Self {
        Self {
            step_id: step_id.into(),
            status: CompensationStatus::Completed,
            start_time,
            end_time: Utc::now(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(step_id: impl Into<String>, start_time: DateTime<Utc>, error: String) -> Self {
        Self {
            step_id: step_id.into(),
            status: CompensationStatus::Failed,
            start_time,
            end_time: Utc::now(),
            result: None,
            error: Some(error),
        }
    }
}

/// One concrete run of a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub definition_id: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub context: WorkflowContext,
    pub step_executions: Vec<StepExecution>,
    pub compensations: Vec<CompensationExecution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowExecution {
    /// A fresh `pending` execution with a random id.
    pub fn new(definition_id: impl Into<String>, context: WorkflowContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            definition_id: definition_id.into(),
            status: ExecutionStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            context,
            step_executions: Vec::new(),
            compensations: Vec::new(),
            error: None,
        }
    }

    /// Move to a terminal status.  `end_time` is only ever set once.
    pub fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        if error.is_some() {
            self.error = error;
        }
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn step_execution(&self, step_id: &str) -> Option<&StepExecution> {
        self.step_executions.iter().find(|s| s.step_id == step_id)
    }

    /// Wall-clock duration, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn definition_parses_from_camel_case_json() {
        let def: WorkflowDefinition = serde_json::from_value(json!({
            "id": "order",
            "name": "Order fulfilment",
            "steps": [
                {
                    "id": "reserve",
                    "name": "Reserve stock",
                    "actionName": "inventory.reserve",
                    "params": { "sku": "A-1" },
                    "compensation": { "actionName": "inventory.release" }
                },
                {
                    "id": "charge",
                    "name": "Charge card",
                    "actionName": "payment.charge",
                    "retryAttempts": 3,
                    "timeoutMs": 500
                }
            ],
            "retryPolicy": { "delayMs": 100 }
        }))
        .unwrap();

        assert_eq!(def.version, "1.0.0");
        assert_eq!(def.steps.len(), 2);
        assert_eq!(def.steps[0].compensation.as_ref().unwrap().action_name, "inventory.release");
        assert!(def.steps[0].condition.is_none());
        assert_eq!(def.steps[1].retry_attempts, Some(3));
        assert_eq!(def.steps[1].timeout_ms, Some(500));
        let policy = def.retry_policy.unwrap();
        assert_eq!(policy.delay_ms, Some(100));
        assert_eq!(policy.max_attempts, None);
    }

    #[test]
    fn statuses_serialise_lowercase() {
        assert_eq!(serde_json::to_value(ExecutionStatus::Compensated).unwrap(), json!("compensated"));
        assert_eq!(serde_json::to_value(StepStatus::Skipped).unwrap(), json!("skipped"));
        assert_eq!(ExecutionStatus::Running.to_string(), "running");
    }

    #[test]
    fn finish_sets_end_time_once() {
        let mut exec = WorkflowExecution::new("wf", WorkflowContext::default());
        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert!(exec.end_time.is_none());

        exec.finish(ExecutionStatus::Completed, None);
        let first_end = exec.end_time.expect("end time set");

        exec.finish(ExecutionStatus::Completed, None);
        assert_eq!(exec.end_time, Some(first_end));
        assert!(exec.is_finished());
        assert!(exec.duration().is_some());
    }

    #[test]
    fn condition_evaluates_against_context() {
        let step = WorkflowStep::new("ship", "shipping.create")
            .when(|ctx| ctx.data.get("express").and_then(Value::as_bool).unwrap_or(false));

        let yes = WorkflowContext::new("w", "c").with_data("express", json!(true));
        let no = WorkflowContext::new("w", "c");
        let cond = step.condition.as_ref().unwrap();
        assert!(cond.evaluate(&yes));
        assert!(!cond.evaluate(&no));
    }
}
