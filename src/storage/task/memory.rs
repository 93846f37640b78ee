use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::TaskStorage;
use crate::schedule::types::{Task, TaskStatus, TaskType};

/// Process-local run store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryTaskStorage {
    tasks: RwLock<HashMap<String, Task>>,
}

impl InMemoryTaskStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStorage for InMemoryTaskStorage {
    async fn create(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(&task.id) {
            return Err(anyhow::anyhow!("Task already exists: {}", task.id));
        }
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get(&self, task_id: &str) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }

    async fn save(&self, task: &Task) -> Result<()> {
        let mut tasks = self.tasks.write().await;
        match tasks.get_mut(&task.id) {
            Some(stored) => {
                *stored = task.clone();
                Ok(())
            }
            None => Err(anyhow::anyhow!("Task not found: {}", task.id)),
        }
    }

    async fn claim_next(&self, task_type: TaskType) -> Result<Option<Task>> {
        let mut tasks = self.tasks.write().await;
        let next = tasks
            .values_mut()
            .filter(|task| task.status == TaskStatus::Triggered && task.task_type() == task_type)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(next.map(|task| {
            let now = Utc::now();
            task.status = TaskStatus::Running;
            task.started_at = Some(now);
            task.updated_at = now;
            task.clone()
        }))
    }

    async fn get_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let tasks = self.tasks.read().await;
        let mut matching: Vec<Task> = tasks.values().filter(|task| task.status == status).cloned().collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    async fn cleanup_old(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut tasks = self.tasks.write().await;
        let len_before = tasks.len();
        tasks.retain(|_, task| !(task.status.is_terminal() && task.updated_at < before));
        Ok((len_before - tasks.len()) as u64)
    }
}
