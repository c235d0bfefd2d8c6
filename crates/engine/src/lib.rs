//! `engine` crate — saga models, validation, and the execution engine.
//!
//! A caller registers action handlers and workflow definitions once, then
//! drives runs through [`WorkflowEngine::execute_workflow`].  Steps run in
//! definition order with per-step retry, backoff and timeout; when a step
//! gives up, the completed steps are compensated in reverse order.

pub mod compensation;
pub mod config;
pub mod error;
pub mod events;
pub mod executor;
pub mod models;
pub mod registry;
pub mod step;
pub mod store;
pub mod validate;

pub use compensation::CompensationCoordinator;
pub use config::EngineConfig;
pub use error::{EngineError, StepError};
pub use events::{BroadcastEventBus, EventBus, EventNotifier, PublishError, WorkflowEvent};
pub use executor::WorkflowEngine;
pub use models::{
    Compensation, CompensationExecution, CompensationStatus, ExecutionStatus, RetryPolicy,
    StepCondition, StepExecution, StepStatus, WorkflowDefinition, WorkflowExecution, WorkflowStep,
};
pub use registry::WorkflowRegistry;
pub use step::StepExecutor;
pub use store::ExecutionStore;
pub use validate::validate_definition;

pub use actions::{ActionError, ActionHandler, ActionRegistry, Params, WorkflowContext};
