//! In-memory execution store and history queries.
//!
//! Nothing here survives a process restart.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::models::WorkflowExecution;

/// Execution records keyed by execution id.
///
/// The engine saves a fresh copy after every transition, so a lookup while
/// a run is in flight returns its latest state and a lookup afterwards
/// returns the final record.
#[derive(Debug, Default)]
pub struct ExecutionStore {
    executions: RwLock<HashMap<Uuid, WorkflowExecution>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `execution.id`.
    pub fn save(&self, execution: &WorkflowExecution) {
        let mut executions = self.executions.write().unwrap_or_else(|p| p.into_inner());
        executions.insert(execution.id, execution.clone());
    }

    pub fn get(&self, id: &Uuid) -> Option<WorkflowExecution> {
        let executions = self.executions.read().unwrap_or_else(|p| p.into_inner());
        executions.get(id).cloned()
    }

    /// Executions of `definition_id`, newest `start_time` first, at most `limit`.
    pub fn history(&self, definition_id: &str, limit: usize) -> Vec<WorkflowExecution> {
        let executions = self.executions.read().unwrap_or_else(|p| p.into_inner());
        let mut matching: Vec<WorkflowExecution> = executions
            .values()
            .filter(|e| e.definition_id == definition_id)
            .cloned()
            .collect();
        drop(executions);

        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        matching.truncate(limit);
        matching
    }

    pub fn len(&self) -> usize {
        self.executions.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
