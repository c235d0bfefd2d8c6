//! The `ActionHandler` trait — the contract every action must fulfil.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{ActionError, Params, WorkflowContext};

/// A named, asynchronous unit of business work.
///
/// Handlers must return `Err` on failure.  A handler may be invoked again
/// by the retry policy, and an invocation that outlives its step timeout is
/// abandoned rather than cancelled, so handlers should be idempotent.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action with the step's `params` against a snapshot of the
    /// run's context and return the step result.
    async fn execute(
        &self,
        params: Params,
        ctx: Arc<WorkflowContext>,
    ) -> Result<Value, ActionError>;
}

/// Adapter that lets a plain async closure act as an [`ActionHandler`].
pub struct FnAction<F> {
    f: F,
}

/// Wrap an async closure as an action handler.
///
/// ```ignore
/// registry.register("release", action_fn(|params, _ctx| async move {
///     Ok(serde_json::json!({ "released": params["sku"] }))
/// }));
/// ```
pub fn action_fn<F, Fut>(f: F) -> FnAction<F>
where
    F: Fn(Params, Arc<WorkflowContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send,
{
    FnAction { f }
}

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(Params, Arc<WorkflowContext>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ActionError>> + Send,
{
    async fn execute(
        &self,
        params: Params,
        ctx: Arc<WorkflowContext>,
    ) -> Result<Value, ActionError> {
        (self.f)(params, ctx).await
    }
}
