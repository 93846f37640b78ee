use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::llm::{LlmRequest, LlmResult};
use crate::media::{FrameExtractionRequest, FrameExtractionResult};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    ExtractFrame,
    RunLlm,
}

impl TaskType {
    pub const ALL: [TaskType; 2] = [TaskType::ExtractFrame, TaskType::RunLlm];

    /// Registered task id on the execution service.
    pub fn id(&self) -> &'static str {
        match self {
            TaskType::ExtractFrame => "extract-frame",
            TaskType::RunLlm => "run-llm",
        }
    }

    /// Wall-clock ceiling for one attempt.
    pub fn max_duration(&self) -> Duration {
        match self {
            TaskType::ExtractFrame => Duration::from_secs(60),
            TaskType::RunLlm => Duration::from_secs(120),
        }
    }
}

impl Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(id: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|task_type| task_type.id() == id)
            .ok_or_else(|| format!("Unknown task id: {}", id))
    }
}

/// A task id together with its payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "payload", rename_all = "kebab-case")]
pub enum TaskParams {
    ExtractFrame(FrameExtractionRequest),
    RunLlm(LlmRequest),
}

impl TaskParams {
    pub fn task_type(&self) -> TaskType {
        match self {
            TaskParams::ExtractFrame(_) => TaskType::ExtractFrame,
            TaskParams::RunLlm(_) => TaskType::RunLlm,
        }
    }

    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            TaskParams::ExtractFrame(request) => serde_json::to_value(request),
            TaskParams::RunLlm(request) => serde_json::to_value(request),
        }
    }

    /// Builds params from a registered task id and its raw JSON payload.
    pub fn from_parts(task_id: &str, payload: serde_json::Value) -> Result<Self, TaskError> {
        let task_type: TaskType = task_id.parse().map_err(TaskError::Validation)?;
        let invalid = |e: serde_json::Error| TaskError::Validation(format!("invalid {} payload: {}", task_type, e));
        match task_type {
            TaskType::ExtractFrame => serde_json::from_value(payload).map(TaskParams::ExtractFrame).map_err(invalid),
            TaskType::RunLlm => serde_json::from_value(payload).map(TaskParams::RunLlm).map_err(invalid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", content = "output", rename_all = "kebab-case")]
pub enum TaskResult {
    ExtractFrame(FrameExtractionResult),
    RunLlm(LlmResult),
}

impl TaskResult {
    pub fn output(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            TaskResult::ExtractFrame(result) => serde_json::to_value(result),
            TaskResult::RunLlm(result) => serde_json::to_value(result),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Triggered,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskStatus::Triggered => "triggered",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Opaque id plus status, returned as soon as a task is enqueued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHandle {
    pub id: String,
    pub status: TaskStatus,
}

/// Outcome of a run as reported by the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskRun {
    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            id: self.id.clone(),
            status: self.status,
        }
    }
}

/// A run held by the local execution service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub status: TaskStatus,
    pub params: TaskParams,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<TaskResult>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(id: String, params: TaskParams) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: TaskStatus::Triggered,
            params,
            attempts: 0,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.params.task_type()
    }

    pub fn handle(&self) -> TaskHandle {
        TaskHandle {
            id: self.id.clone(),
            status: self.status,
        }
    }

    pub fn to_run(&self) -> TaskRun {
        TaskRun {
            id: self.id.clone(),
            status: self.status,
            output: self.result.as_ref().and_then(|result| result.output().ok()),
            error: self.error.clone(),
        }
    }
}
