//! `MockAction` — a test double for `ActionHandler`.
//!
//! Useful in unit and integration tests, and in the CLI demo, where a real
//! action implementation is either unavailable or irrelevant.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;

use crate::{ActionError, ActionHandler, Params, WorkflowContext};

/// Behaviour injected into `MockAction` at construction time.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Always fail with the given message.
    Fail(String),
    /// Fail the first `failures` calls, then return `value`.
    FailTimes { failures: usize, value: Value },
    /// Sleep for `delay`, then return `value`.
    Delayed { delay: Duration, value: Value },
    /// Never resolve.
    Hang,
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub params: Params,
    pub correlation_id: String,
    /// Tokio clock reading, so paused-time tests can measure gaps exactly.
    pub at: Instant,
}

/// A mock action that records every call it receives and behaves as
/// programmed.  Clones share the same call log, so a test can keep one
/// clone and register the other.
#[derive(Debug, Clone)]
pub struct MockAction {
    pub behaviour: MockBehaviour,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockAction {
    pub fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that always succeeds with the given value.
    pub fn returning(value: Value) -> Self {
        Self::new(MockBehaviour::ReturnValue(value))
    }

    /// A mock that always fails.
    pub fn failing(msg: impl Into<String>) -> Self {
        Self::new(MockBehaviour::Fail(msg.into()))
    }

    /// A mock that fails `failures` times before succeeding.
    pub fn flaky(failures: usize, value: Value) -> Self {
        Self::new(MockBehaviour::FailTimes { failures, value })
    }

    pub fn delayed(delay: Duration, value: Value) -> Self {
        Self::new(MockBehaviour::Delayed { delay, value })
    }

    /// A mock whose future never completes.
    pub fn hanging() -> Self {
        Self::new(MockBehaviour::Hang)
    }

    /// Number of times this action has been invoked.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// All calls seen so far, in call order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl ActionHandler for MockAction {
    async fn execute(
        &self,
        params: Params,
        ctx: Arc<WorkflowContext>,
    ) -> Result<Value, ActionError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap_or_else(|p| p.into_inner());
            calls.push(MockCall {
                params,
                correlation_id: ctx.correlation_id.clone(),
                at: Instant::now(),
            });
            calls.len()
        };

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => Ok(v.clone()),
            MockBehaviour::Fail(msg) => Err(ActionError::failed(msg.clone())),
            MockBehaviour::FailTimes { failures, value } => {
                if call_number <= *failures {
                    Err(ActionError::failed(format!("transient failure #{call_number}")))
                } else {
                    Ok(value.clone())
                }
            }
            MockBehaviour::Delayed { delay, value } => {
                tokio::time::sleep(*delay).await;
                Ok(value.clone())
            }
            MockBehaviour::Hang => std::future::pending().await,
        }
    }
}
