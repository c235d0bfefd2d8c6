//! Lifecycle notifications: `workflow.started`, `workflow.completed`,
//! `workflow.failed`.
//!
//! The engine only knows the [`EventBus`] trait.  [`BroadcastEventBus`] is an
//! in-process implementation over `tokio::sync::broadcast`; anything else
//! (a message broker, a database outbox) is supplied by the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::WorkflowExecution;

pub const WORKFLOW_STARTED: &str = "workflow.started";
pub const WORKFLOW_COMPLETED: &str = "workflow.completed";
pub const WORKFLOW_FAILED: &str = "workflow.failed";

/// Envelope published for every lifecycle transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub version: u32,
    pub payload: Value,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event bus closed")]
    Closed,

    #[error("event publish failed: {0}")]
    Transport(String),
}

/// Destination for lifecycle events.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError>;
}

// ---------------------------------------------------------------------------
// EventNotifier
// ---------------------------------------------------------------------------

/// Builds lifecycle events and hands them to the configured bus.
///
/// Without a bus every call is a no-op.  A failed publish is logged and
/// otherwise ignored; it never changes the outcome of a run.
#[derive(Clone)]
pub struct EventNotifier {
    bus: Option<Arc<dyn EventBus>>,
    source: String,
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new(None, EngineConfig::default().event_source)
    }
}

impl EventNotifier {
    pub fn new(bus: Option<Arc<dyn EventBus>>, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bus.is_some()
    }

    pub async fn started(&self, execution: &WorkflowExecution) {
        self.emit(
            WORKFLOW_STARTED,
            json!({
                "executionId": execution.id,
                "workflowId": execution.definition_id,
            }),
        )
        .await;
    }

    pub async fn completed(&self, execution: &WorkflowExecution) {
        self.emit(
            WORKFLOW_COMPLETED,
            json!({
                "executionId": execution.id,
                "workflowId": execution.definition_id,
                "outputs": execution.context.outputs,
            }),
        )
        .await;
    }

    pub async fn failed(&self, execution: &WorkflowExecution) {
        self.emit(
            WORKFLOW_FAILED,
            json!({
                "executionId": execution.id,
                "workflowId": execution.definition_id,
                "error": execution.error,
            }),
        )
        .await;
    }

    async fn emit(&self, event_type: &str, payload: Value) {
        let Some(bus) = &self.bus else {
            return;
        };

        let event = WorkflowEvent {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            timestamp: Utc::now(),
            source: self.source.clone(),
            version: 1,
            payload,
        };

        debug!("publishing {} ({})", event.event_type, event.id);
        if let Err(e) = bus.publish(event).await {
            warn!("failed to publish {}: {}", event_type, e);
        }
    }
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventNotifier")
            .field("enabled", &self.is_enabled())
            .field("source", &self.source)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// BroadcastEventBus
// ---------------------------------------------------------------------------

/// Multi-consumer in-process bus.  Cloning shares the underlying channel.
/// Publishing with no subscribers drops the event.
#[derive(Clone)]
pub struct BroadcastEventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// A receiver for all events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EventBus for BroadcastEventBus {
    async fn publish(&self, event: WorkflowEvent) -> Result<(), PublishError> {
        let _ = self.sender.send(event);
        Ok(())
    }
}

impl std::fmt::Debug for BroadcastEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastEventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actions::WorkflowContext;

    struct FailingBus;

    #[async_trait]
    impl EventBus for FailingBus {
        async fn publish(&self, _event: WorkflowEvent) -> Result<(), PublishError> {
            Err(PublishError::Transport("broker unreachable".into()))
        }
    }

    fn execution() -> WorkflowExecution {
        WorkflowExecution::new("order", WorkflowContext::new("order", "corr"))
    }

    #[tokio::test]
    async fn started_event_has_envelope_and_payload() {
        let bus = BroadcastEventBus::new(8);
        let mut rx = bus.subscribe();
        let notifier = EventNotifier::new(Some(Arc::new(bus)), "workflow-engine");
        let exec = execution();

        notifier.started(&exec).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "workflow.started");
        assert_eq!(event.source, "workflow-engine");
        assert_eq!(event.version, 1);
        assert_eq!(event.payload["executionId"], json!(exec.id));
        assert_eq!(event.payload["workflowId"], "order");

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "workflow.started");
    }

    #[tokio::test]
    async fn completed_and_failed_carry_outputs_and_error() {
        let bus = BroadcastEventBus::new(8);
        let mut rx = bus.subscribe();
        let notifier = EventNotifier::new(Some(Arc::new(bus)), "workflow-engine");

        let mut exec = execution();
        exec.context.outputs.insert("reserve".into(), json!({ "id": 3 }));
        notifier.completed(&exec).await;
        exec.error = Some("Step charge failed: declined".into());
        notifier.failed(&exec).await;

        let completed = rx.recv().await.unwrap();
        assert_eq!(completed.payload["outputs"]["reserve"]["id"], 3);
        let failed = rx.recv().await.unwrap();
        assert_eq!(failed.event_type, "workflow.failed");
        assert_eq!(failed.payload["error"], "Step charge failed: declined");
    }

    #[tokio::test]
    async fn no_bus_is_a_no_op() {
        let notifier = EventNotifier::default();
        assert!(!notifier.is_enabled());
        notifier.started(&execution()).await;
    }

    #[tokio::test]
    async fn default_notifier_uses_engine_source() {
        let bus = BroadcastEventBus::new(8);
        let mut rx = bus.subscribe();
        let notifier = EventNotifier {
            bus: Some(Arc::new(bus)),
            ..EventNotifier::default()
        };

        notifier.started(&execution()).await;

        assert_eq!(rx.recv().await.unwrap().source, "workflow-engine");
    }

    #[tokio::test]
    async fn publish_errors_are_swallowed() {
        let notifier = EventNotifier::new(Some(Arc::new(FailingBus)), "workflow-engine");
        notifier.failed(&execution()).await;
    }

    #[tokio::test]
    async fn broadcast_without_subscribers_is_ok() {
        let bus = BroadcastEventBus::default();
        let notifier = EventNotifier::new(Some(Arc::new(bus)), "workflow-engine");
        notifier.completed(&execution()).await;
    }
}
