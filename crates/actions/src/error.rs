//! Action-level error type.

use thiserror::Error;

/// Errors returned by an action handler's `execute` method.
///
/// Every variant is treated the same by the engine: the attempt failed and
/// may be retried according to the step's retry policy.  The `Display`
/// output is what ends up in the execution record.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action ran and reported a failure.
    #[error("{0}")]
    Failed(String),

    /// The step's `params` did not have the shape the action expects.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// Any other error bubbled up from the handler body.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    /// Shorthand for [`ActionError::Failed`].
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}
