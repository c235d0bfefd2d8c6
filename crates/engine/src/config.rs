//! Engine-wide fallbacks used when a step or retry policy leaves a knob unset.

use std::time::Duration;

/// Tuning knobs for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timeout for a single attempt when the step sets no `timeout_ms`.
    pub default_step_timeout: Duration,
    /// Base retry delay when the policy sets no `delay_ms`.
    pub default_retry_delay: Duration,
    /// Backoff factor when the policy sets no `backoff_multiplier`.
    pub default_backoff_multiplier: f64,
    /// Attempts when neither the step nor the policy says otherwise.
    pub default_max_attempts: u32,
    /// Default `limit` for execution history queries.
    pub history_limit: usize,
    /// `source` field stamped on every published event.
    pub event_source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_step_timeout: Duration::from_millis(30_000),
            default_retry_delay: Duration::from_millis(1_000),
            default_backoff_multiplier: 2.0,
            default_max_attempts: 1,
            history_limit: 100,
            event_source: "workflow-engine".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.default_step_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.default_retry_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.default_backoff_multiplier = multiplier;
        self
    }
}
