use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::time::{sleep, timeout};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::error::TaskError;
use crate::schedule::dispatcher::TaskDispatcher;
use crate::schedule::processors::TaskProcessor;
use crate::schedule::types::{Task, TaskHandle, TaskParams, TaskResult, TaskRun, TaskStatus, TaskType};
use crate::storage::task::TaskStorage;

/// Local execution service: owns the run store and the registered task
/// bodies, and applies the global retry policy and per-task ceilings.
pub struct TaskManager {
    storage: Arc<dyn TaskStorage>,
    processors: HashMap<TaskType, Arc<dyn TaskProcessor>>,
    config: ExecutionConfig,
}

impl TaskManager {
    pub fn new(storage: Arc<dyn TaskStorage>, config: ExecutionConfig) -> Self {
        Self {
            storage,
            processors: HashMap::new(),
            config,
        }
    }

    pub fn storage(&self) -> &Arc<dyn TaskStorage> {
        &self.storage
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn register_processor(&mut self, processor: Arc<dyn TaskProcessor>) {
        let task_type = processor.task_type();
        info!("Registering processor for task type: {}", task_type);
        self.processors.insert(task_type, processor);
    }

    pub fn registered_types(&self) -> Vec<TaskType> {
        TaskType::ALL
            .into_iter()
            .filter(|task_type| self.processors.contains_key(task_type))
            .collect()
    }

    fn processor(&self, task_type: TaskType) -> Result<&Arc<dyn TaskProcessor>, TaskError> {
        self.processors
            .get(&task_type)
            .ok_or_else(|| TaskError::Config(format!("No processor registered for task type: {}", task_type)))
    }

    /// Validates and stores a new run as `triggered`. Does not wait for it.
    pub async fn create_task(&self, params: TaskParams) -> Result<Task> {
        let processor = self.processor(params.task_type())?;
        processor.validate_params(&params)?;

        let task = Task::new(format!("run_{}", Uuid::new_v4().simple()), params);
        self.storage.create(&task).await?;

        info!("Created {} task: {}", task.task_type(), task.id);
        Ok(task)
    }

    /// Claims the oldest triggered run of `task_type`, now marked running.
    pub async fn get_next_task(&self, task_type: TaskType) -> Result<Option<Task>> {
        let task = self.storage.claim_next(task_type).await?;
        if let Some(task) = &task {
            info!("Starting task {}", task.id);
        }
        Ok(task)
    }

    /// Runs a claimed task to a terminal state and stores it.
    ///
    /// Each attempt invokes the processor from scratch under the task's
    /// ceiling. Failed attempts are re-run with backoff until the retry
    /// policy is exhausted.
    pub async fn process_task(&self, mut task: Task) -> Result<Task> {
        let processor = self.processor(task.task_type())?.clone();
        let max_attempts = self.config.retry.attempts_for(self.config.environment);
        let ceiling = attempt_ceiling(processor.max_duration(), self.config.default_max_duration);

        info!(
            "Processing task {} with processor {} (ceiling {:?}, {} attempt(s))",
            task.id,
            task.task_type(),
            ceiling,
            max_attempts
        );

        let outcome = loop {
            task.attempts += 1;
            task.updated_at = Utc::now();
            self.storage.save(&task).await?;

            match run_attempt(processor.as_ref(), &task, ceiling).await {
                Ok(result) => break Ok(result),
                Err(e) if task.attempts < max_attempts => {
                    let delay = self.config.retry.delay_for(task.attempts);
                    warn!(
                        "Retrying task {} after {:?} (attempt {}/{} failed: {})",
                        task.id, delay, task.attempts, max_attempts, e
                    );
                    sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        match outcome {
            Ok(result) => {
                info!("Task {} completed successfully", task.id);
                finish(&mut task, TaskStatus::Completed, Some(result), None);
            }
            Err(e) => {
                error!("Task {} failed after {} attempt(s): {} ({})", task.id, task.attempts, e, e.kind());
                finish(&mut task, TaskStatus::Failed, None, Some(e.to_string()));
            }
        }

        self.storage.save(&task).await?;
        Ok(task)
    }

    /// Marks a run failed without running it again, e.g. after its
    /// execution panicked.
    pub async fn abort_task(&self, task_id: &str, reason: &str) -> Result<()> {
        let mut task = self
            .storage
            .get(task_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Task not found: {}", task_id))?;

        if task.status.is_terminal() {
            return Ok(());
        }

        finish(&mut task, TaskStatus::Failed, None, Some(reason.to_string()));
        self.storage.save(&task).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>> {
        self.storage.get(task_id).await
    }

    /// Drops terminal runs older than the retention window.
    pub async fn cleanup_tasks(&self) -> Result<u64> {
        let cutoff = Utc::now() - self.config.retention;
        let removed = self.storage.cleanup_old(cutoff).await?;
        if removed > 0 {
            info!("Removed {} finished task(s) older than {}", removed, cutoff);
        }
        Ok(removed)
    }
}

/// A processor's own limit can only tighten the project-wide cap.
fn attempt_ceiling(limit: Option<Duration>, cap: Duration) -> Duration {
    limit.map_or(cap, |limit| limit.min(cap))
}

fn finish(task: &mut Task, status: TaskStatus, result: Option<TaskResult>, error: Option<String>) {
    let now = Utc::now();
    task.status = status;
    task.result = result;
    task.error = error;
    task.completed_at = Some(now);
    task.updated_at = now;
}

async fn run_attempt(processor: &dyn TaskProcessor, task: &Task, ceiling: Duration) -> Result<TaskResult, TaskError> {
    match timeout(ceiling, processor.process(task)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!("Task {} exceeded {:?}, abandoning attempt", task.id, ceiling);
            Err(TaskError::Timeout {
                seconds: ceiling.as_secs(),
            })
        }
    }
}

fn into_task_error(e: anyhow::Error) -> TaskError {
    match e.downcast::<TaskError>() {
        Ok(e) => e,
        Err(e) => TaskError::Dispatch {
            status: 500,
            body: e.to_string(),
        },
    }
}

#[async_trait]
impl TaskDispatcher for TaskManager {
    async fn enqueue(&self, params: TaskParams) -> Result<TaskHandle, TaskError> {
        self.create_task(params)
            .await
            .map(|task| task.handle())
            .map_err(into_task_error)
    }

    async fn retrieve(&self, run_id: &str) -> Result<Option<TaskRun>, TaskError> {
        self.get_task(run_id)
            .await
            .map(|task| task.map(|task| task.to_run()))
            .map_err(into_task_error)
    }
}
