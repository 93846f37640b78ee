mod task_manager;
mod worker;

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::sync::Mutex;
use anyhow::Result;
use tracing::{error, info};

pub use task_manager::TaskManager;
pub use worker::TaskWorker;
use crate::schedule::types::TaskType;

const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

pub struct TaskScheduler {
    task_manager: Arc<TaskManager>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl TaskScheduler {
    pub fn new(task_manager: Arc<TaskManager>) -> Self {
        Self {
            task_manager,
            workers: Mutex::new(Vec::new()),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn task_manager(&self) -> &Arc<TaskManager> {
        &self.task_manager
    }

    pub async fn spawn_worker(&self, task_type: TaskType) {
        let worker = TaskWorker::new(self.task_manager.clone(), task_type).with_interval(self.poll_interval);
        let handle = tokio::spawn(async move {
            worker.run().await;
        });
        self.workers.lock().await.push(handle);
    }

    /// Starts the configured number of workers for every registered type.
    pub async fn spawn_workers(&self) {
        let count = self.task_manager.config().workers_per_task;
        for task_type in self.task_manager.registered_types() {
            info!("Starting {} worker(s) for {}", count, task_type);
            for _ in 0..count {
                self.spawn_worker(task_type).await;
            }
        }
    }

    pub async fn run(&self) -> Result<()> {
        // periodic removal of expired runs
        let tm = self.task_manager.clone();
        let housekeeping = tokio::spawn(async move {
            loop {
                if let Err(e) = tm.cleanup_tasks().await {
                    error!("Error cleaning up finished tasks: {}", e);
                }
                tokio::time::sleep(HOUSEKEEPING_INTERVAL).await;
            }
        });

        // wait for all workers to finish
        let mut workers = self.workers.lock().await;
        for worker in workers.drain(..) {
            worker.await?;
        }

        housekeeping.abort();
        Ok(())
    }
}
