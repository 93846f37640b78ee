use axum::{
    extract::{rejection::JsonRejection, Json, State},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::llm::LlmRequest;
use crate::media::{FrameExtractionRequest, SeekUnit};
use crate::schedule::types::{TaskHandle, TaskParams};
use crate::schedule::TaskDispatcher;
use crate::web::ApiError;
use crate::AppContext;

pub fn trigger_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/extract-frame", post(trigger_extract_frame))
        .route("/run-llm", post(trigger_run_llm))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractFrameBody {
    video_url: Option<String>,
    timestamp: Option<f64>,
    unit: Option<SeekUnit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunLlmBody {
    model: Option<String>,
    system_prompt: Option<String>,
    user_message: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    temperature: Option<f64>,
}

// body shape errors answer like any other validation failure
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{} is required", field)))
}

// Trigger frame extraction endpoint
async fn trigger_extract_frame(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<ExtractFrameBody>, JsonRejection>,
) -> Result<Json<TaskHandle>, ApiError> {
    let body = parse_body(payload)?;
    let request = FrameExtractionRequest {
        video_url: required(body.video_url, "videoUrl")?,
        timestamp: body.timestamp.unwrap_or(0.0),
        unit: body.unit.unwrap_or_default(),
    };
    request.validate()?;

    let handle = ctx.dispatcher.enqueue(TaskParams::ExtractFrame(request)).await?;
    info!("Triggered extract-frame run {}", handle.id);
    Ok(Json(handle))
}

// Trigger LLM run endpoint
async fn trigger_run_llm(
    State(ctx): State<Arc<AppContext>>,
    payload: Result<Json<RunLlmBody>, JsonRejection>,
) -> Result<Json<TaskHandle>, ApiError> {
    let body = parse_body(payload)?;
    let mut request = LlmRequest::new(required(body.model, "model")?, required(body.user_message, "userMessage")?)
        .with_images(body.images);
    if let Some(system_prompt) = body.system_prompt {
        request = request.with_system_prompt(system_prompt);
    }
    if let Some(temperature) = body.temperature {
        request = request.with_temperature(temperature);
    }
    request.validate()?;

    let handle = ctx.dispatcher.enqueue(TaskParams::RunLlm(request)).await?;
    info!("Triggered run-llm run {}", handle.id);
    Ok(Json(handle))
}
