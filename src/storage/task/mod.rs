use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::schedule::types::{Task, TaskStatus, TaskType};

pub mod memory;

pub use memory::InMemoryTaskStorage;

/// Run records of the local execution service.
#[async_trait]
pub trait TaskStorage: Send + Sync + 'static {
    async fn create(&self, task: &Task) -> Result<()>;
    async fn get(&self, task_id: &str) -> Result<Option<Task>>;
    /// Replaces the stored record with the same id.
    async fn save(&self, task: &Task) -> Result<()>;
    /// Atomically moves the oldest triggered task of `task_type` to running.
    async fn claim_next(&self, task_type: TaskType) -> Result<Option<Task>>;
    async fn get_by_status(&self, status: TaskStatus) -> Result<Vec<Task>>;
    /// Removes terminal runs last updated before `before`.
    async fn cleanup_old(&self, before: DateTime<Utc>) -> Result<u64>;
}

#[cfg(test)]
mod tests;
