use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::dispatcher::TaskDispatcher;
use crate::config::TriggerConfig;
use crate::error::TaskError;
use crate::schedule::types::{TaskHandle, TaskParams, TaskRun, TaskStatus};
use crate::utils::http::{build_client, error_parts, join_url};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hands runs to a remote execution service over its REST API.
pub struct TriggerClient {
    client: Client,
    api_url: String,
    secret_key: String,
}

#[derive(Serialize)]
struct TriggerBody<'a> {
    payload: &'a Value,
}

#[derive(Deserialize)]
struct TriggerResponse {
    id: String,
}

#[derive(Deserialize)]
struct RunResponse {
    id: String,
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<RunError>,
}

#[derive(Deserialize)]
struct RunError {
    #[serde(default)]
    message: Option<String>,
}

impl TriggerClient {
    pub fn new(config: &TriggerConfig) -> Self {
        Self {
            client: build_client(REQUEST_TIMEOUT),
            api_url: config.api_url.clone(),
            secret_key: config.secret_key.clone(),
        }
    }
}

/// Collapses the service's run states into the four the caller sees.
fn map_run_status(status: &str) -> TaskStatus {
    match status {
        "PENDING_VERSION" | "WAITING_FOR_DEPLOY" | "QUEUED" | "DELAYED" => TaskStatus::Triggered,
        "EXECUTING" | "REATTEMPTING" | "FROZEN" | "WAITING" => TaskStatus::Running,
        "COMPLETED" => TaskStatus::Completed,
        _ => TaskStatus::Failed,
    }
}

#[async_trait]
impl TaskDispatcher for TriggerClient {
    async fn enqueue(&self, params: TaskParams) -> Result<TaskHandle, TaskError> {
        let task_id = params.task_type().id();
        let payload = params
            .payload()
            .map_err(|e| TaskError::Validation(format!("unserializable payload: {}", e)))?;

        let url = join_url(&self.api_url, &format!("api/v1/tasks/{}/trigger", task_id));
        debug!("Triggering {} via {}", task_id, url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(&TriggerBody { payload: &payload })
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_parts(response).await;
            return Err(TaskError::Dispatch { status, body });
        }

        let TriggerResponse { id } = response.json().await?;
        info!("Triggered {} run {}", task_id, id);
        Ok(TaskHandle {
            id,
            status: TaskStatus::Triggered,
        })
    }

    async fn retrieve(&self, run_id: &str) -> Result<Option<TaskRun>, TaskError> {
        let url = join_url(&self.api_url, &format!("api/v3/runs/{}", run_id));
        let response = self.client.get(url).bearer_auth(&self.secret_key).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let (status, body) = error_parts(response).await;
            return Err(TaskError::Dispatch { status, body });
        }

        let run: RunResponse = response.json().await?;
        Ok(Some(TaskRun {
            id: run.id,
            status: map_run_status(&run.status),
            output: run.output,
            error: run.error.and_then(|error| error.message),
        }))
    }
}
