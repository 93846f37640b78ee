pub mod extract_frame;
pub mod run_llm;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::schedule::types::{Task, TaskParams, TaskResult, TaskType};

pub use extract_frame::ExtractFrameProcessor;
pub use run_llm::RunLlmProcessor;

/// Body of one registered task.
///
/// `process` is re-invoked from scratch on retry, so it must not rely on
/// anything a previous attempt left behind.
#[async_trait]
pub trait TaskProcessor: Send + Sync {
    fn task_type(&self) -> TaskType;

    /// Wall-clock ceiling per attempt. The project-wide cap still applies;
    /// `None` leaves only the cap.
    fn max_duration(&self) -> Option<Duration> {
        Some(self.task_type().max_duration())
    }

    /// Cheap checks run at enqueue time, before any I/O.
    fn validate_params(&self, params: &TaskParams) -> Result<(), TaskError>;

    async fn process(&self, task: &Task) -> Result<TaskResult, TaskError>;
}

fn mismatched_params(expected: TaskType, params: &TaskParams) -> TaskError {
    TaskError::Validation(format!(
        "{} processor received {} params",
        expected,
        params.task_type()
    ))
}
