//! Single-step execution: handler lookup, timeout racing, retry with backoff.
//!
//! Each attempt spawns the handler onto the runtime and races its join
//! handle against the step timeout.  When the timer wins, the join handle
//! is dropped: the handler task is detached, not aborted, and keeps running
//! until it settles on its own.  Its result is discarded.  Actions that are
//! not idempotent can therefore apply their side effect after the engine
//! has already moved on (and possibly retried or compensated).

use std::sync::Arc;
use std::time::Duration;

use actions::{ActionHandler, ActionRegistry, Params, WorkflowContext};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::error::StepError;
use crate::models::{RetryPolicy, WorkflowStep};

/// `step.retry_attempts`, else `policy.max_attempts`, else the engine default.
/// Never less than one.
pub fn resolve_max_attempts(
    step: &WorkflowStep,
    policy: Option<&RetryPolicy>,
    config: &EngineConfig,
) -> u32 {
    step.retry_attempts
        .or_else(|| policy.and_then(|p| p.max_attempts))
        .unwrap_or(config.default_max_attempts)
        .max(1)
}

/// `step.timeout_ms`, else the engine default (30 s).
pub fn resolve_timeout(step: &WorkflowStep, config: &EngineConfig) -> Duration {
    step.timeout_ms
        .map(Duration::from_millis)
        .unwrap_or(config.default_step_timeout)
}

/// Delay before the attempt following failed attempt number `attempt`
/// (1-based): `delay * multiplier^(attempt - 1)`.  No jitter.
pub fn backoff_delay(policy: Option<&RetryPolicy>, config: &EngineConfig, attempt: u32) -> Duration {
    let base = policy
        .and_then(|p| p.delay_ms)
        .map(Duration::from_millis)
        .unwrap_or(config.default_retry_delay);
    let multiplier = policy
        .and_then(|p| p.backoff_multiplier)
        .unwrap_or(config.default_backoff_multiplier);
    let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);

    // `as` saturates: NaN and negatives become 0, overflow becomes u64::MAX.
    let millis = base.as_millis() as f64 * multiplier.powi(exponent);
    Duration::from_millis(millis.round() as u64)
}

/// Runs one step to a result or to its final error.
#[derive(Debug, Clone)]
pub struct StepExecutor {
    actions: Arc<ActionRegistry>,
    config: EngineConfig,
}

impl StepExecutor {
    pub fn new(actions: Arc<ActionRegistry>, config: EngineConfig) -> Self {
        Self { actions, config }
    }

    /// Execute `step` against a snapshot of the run's context.
    ///
    /// # Errors
    /// - [`StepError::ActionNotFound`] immediately, without retrying.
    /// - Otherwise the error of the last attempt once all attempts failed.
    #[instrument(skip_all, fields(step_id = %step.id, action = %step.action_name))]
    pub async fn execute(
        &self,
        step: &WorkflowStep,
        ctx: Arc<WorkflowContext>,
        policy: Option<&RetryPolicy>,
    ) -> Result<Value, StepError> {
        let handler = self
            .actions
            .get(&step.action_name)
            .ok_or_else(|| StepError::ActionNotFound(step.action_name.clone()))?;

        let max_attempts = resolve_max_attempts(step, policy, &self.config);
        let timeout = resolve_timeout(step, &self.config);
        let mut attempt = 1u32;

        loop {
            debug!("attempt {}/{} (timeout {:?})", attempt, max_attempts, timeout);

            match Self::attempt(&handler, step.params.clone(), Arc::clone(&ctx), timeout).await {
                Ok(result) => return Ok(result),

                Err(err) if attempt >= max_attempts => {
                    warn!("giving up after {} attempt(s): {}", attempt, err);
                    return Err(err);
                }

                Err(err) => {
                    let delay = backoff_delay(policy, &self.config, attempt);
                    warn!(
                        "attempt {}/{} failed, retrying in {:?}: {}",
                        attempt, max_attempts, delay, err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(
        handler: &Arc<dyn ActionHandler>,
        params: Params,
        ctx: Arc<WorkflowContext>,
        timeout: Duration,
    ) -> Result<Value, StepError> {
        let handler = Arc::clone(handler);
        let task = tokio::spawn(async move { handler.execute(params, ctx).await });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(outcome)) => outcome.map_err(StepError::from),
            Ok(Err(join_err)) => Err(StepError::Aborted(join_err.to_string())),
            // Dropping the JoinHandle detaches the task.
            Err(_) => Err(StepError::Timeout),
        }
    }
}
