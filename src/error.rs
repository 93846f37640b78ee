use thiserror::Error;

use crate::llm::ProviderKind;

/// Failure of a task body, an adapter or a dispatcher call.
///
/// Every variant propagates to the task's failure channel unchanged. Nothing
/// here is retried in place; the execution service re-runs the whole task.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("{provider} API error: {status} - {body}")]
    Provider {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to fetch media: {status}")]
    Fetch { status: u16 },

    #[error("duration probe failed: {0}")]
    Probe(String),

    #[error("frame extraction failed: {0}")]
    Extraction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task exceeded its {seconds}s duration limit")]
    Timeout { seconds: u64 },

    #[error("execution service error: {status} - {body}")]
    Dispatch { status: u16, body: String },
}

impl TaskError {
    /// Short machine-readable kind, stored alongside failed runs.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Validation(_) => "ValidationError",
            TaskError::Config(_) => "ConfigError",
            TaskError::UnknownModel(_) => "UnknownModelError",
            TaskError::Provider { .. } => "ProviderError",
            TaskError::Transport(_) => "TransportError",
            TaskError::Fetch { .. } => "FetchError",
            TaskError::Probe(_) => "ProbeError",
            TaskError::Extraction(_) => "ExtractionError",
            TaskError::Io(_) => "IOError",
            TaskError::Timeout { .. } => "TimeoutError",
            TaskError::Dispatch { .. } => "DispatchError",
        }
    }
}
