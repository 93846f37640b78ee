use std::sync::Arc;

pub mod dispatcher;
pub mod processors;
pub mod scheduler;
pub mod trigger;
pub mod types;
#[cfg(test)]
mod tests;

pub use types::{Task, TaskHandle, TaskParams, TaskResult, TaskRun, TaskStatus, TaskType};

pub use crate::storage::task::TaskStorage;

pub use dispatcher::TaskDispatcher;
pub use processors::{ExtractFrameProcessor, RunLlmProcessor, TaskProcessor};
pub use scheduler::{TaskManager, TaskScheduler};
pub use trigger::TriggerClient;

use crate::config::ExecutionConfig;

/// Wires a local execution service from a store and the task bodies.
pub fn create_scheduler(
    storage: impl TaskStorage,
    processors: Vec<Arc<dyn TaskProcessor>>,
    config: ExecutionConfig,
) -> TaskScheduler {
    let mut task_manager = TaskManager::new(Arc::new(storage), config);

    for processor in processors {
        task_manager.register_processor(processor);
    }

    TaskScheduler::new(Arc::new(task_manager))
}
