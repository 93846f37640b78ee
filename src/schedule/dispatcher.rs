use async_trait::async_trait;
use serde_json::Value;

use crate::error::TaskError;
use crate::schedule::types::{TaskHandle, TaskParams, TaskRun};

/// Boundary to the execution service.
///
/// `enqueue` returns as soon as the run is accepted and never executes task
/// logic or retries by itself. Callers validate input before enqueueing.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn enqueue(&self, params: TaskParams) -> Result<TaskHandle, TaskError>;

    /// Current state of a run, `None` when the id is unknown.
    async fn retrieve(&self, run_id: &str) -> Result<Option<TaskRun>, TaskError>;

    /// Enqueues by registered task id and raw JSON payload.
    async fn trigger(&self, task_id: &str, payload: Value) -> Result<TaskHandle, TaskError> {
        let params = TaskParams::from_parts(task_id, payload)?;
        self.enqueue(params).await
    }
}
