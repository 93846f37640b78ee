use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use anyhow::Result;

use crate::schedule::types::{TaskStatus, TaskType};
use super::TaskManager;

pub struct TaskWorker {
    task_manager: Arc<TaskManager>,
    // one worker only claims runs of its own type
    task_type: TaskType,
    // idle wait between polls
    interval: Duration,
}

impl TaskWorker {
    pub fn new(task_manager: Arc<TaskManager>, task_type: TaskType) -> Self {
        Self {
            task_manager,
            task_type,
            interval: Duration::from_secs(1),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(&self) {
        loop {
            match self.process_next_task().await {
                Ok(true) => continue,
                Ok(false) => sleep(self.interval).await,
                Err(e) => {
                    error!("Error processing {} task: {}", self.task_type, e);
                    sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// Returns whether a run was claimed.
    pub(crate) async fn process_next_task(&self) -> Result<bool> {
        let task = match self.task_manager.get_next_task(self.task_type).await? {
            Some(task) => task,
            None => return Ok(false),
        };
        let task_id = task.id.clone();

        // a panicking task body must not take the worker down with it
        let manager = self.task_manager.clone();
        match tokio::spawn(async move { manager.process_task(task).await }).await {
            Ok(finished) => {
                let task = finished?;
                if task.status == TaskStatus::Completed {
                    info!("{} task {} done", self.task_type, task.id);
                }
            }
            Err(e) => {
                error!("Task {} aborted: {}", task_id, e);
                self.task_manager
                    .abort_task(&task_id, &format!("task execution aborted: {}", e))
                    .await?;
            }
        }

        Ok(true)
    }
}
