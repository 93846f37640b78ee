use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use super::{mismatched_params, TaskProcessor};
use crate::error::TaskError;
use crate::llm::LlmRouter;
use crate::schedule::types::{Task, TaskParams, TaskResult, TaskType};

/// `run-llm`: picks the provider adapter by model prefix and delegates.
#[derive(Clone)]
pub struct RunLlmProcessor {
    router: Arc<LlmRouter>,
}

impl RunLlmProcessor {
    pub fn new(router: Arc<LlmRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl TaskProcessor for RunLlmProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::RunLlm
    }

    fn validate_params(&self, params: &TaskParams) -> Result<(), TaskError> {
        match params {
            TaskParams::RunLlm(request) => request.validate().map(|_| ()),
            other => Err(mismatched_params(self.task_type(), other)),
        }
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, TaskError> {
        self.validate_params(&task.params)?;
        let TaskParams::RunLlm(request) = &task.params else {
            return Err(mismatched_params(self.task_type(), &task.params));
        };

        info!("Processing run-llm task {} with model {}", task.id, request.model);

        match self.router.complete(request).await {
            Ok(result) => {
                info!("Task {} produced {} characters", task.id, result.text.len());
                Ok(TaskResult::RunLlm(result))
            }
            Err(e) => {
                warn!("Failed to process task {}: {}", task.id, e);
                Err(e)
            }
        }
    }
}
