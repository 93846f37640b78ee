use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{mismatched_params, TaskProcessor};
use crate::config::MediaConfig;
use crate::error::TaskError;
use crate::media::{
    encode_png_data_url, FrameDecoder, FrameExtractionRequest, FrameExtractionResult, MediaFetcher,
    TempMediaFile, TempScope,
};
use crate::schedule::types::{Task, TaskParams, TaskResult, TaskType};

/// `extract-frame`: downloads the video, seeks, and returns one PNG frame
/// as a data URL.
pub struct ExtractFrameProcessor {
    fetcher: MediaFetcher,
    decoder: Arc<dyn FrameDecoder>,
    temp_dir: PathBuf,
}

impl ExtractFrameProcessor {
    pub fn new(config: &MediaConfig, decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            fetcher: MediaFetcher::new(config),
            decoder,
            temp_dir: config.temp_dir.clone(),
        }
    }

    /// Runs one extraction. Both temp files are gone when this returns,
    /// and also when the future is dropped early.
    pub async fn extract(&self, request: &FrameExtractionRequest) -> Result<FrameExtractionResult, TaskError> {
        request.validate()?;

        let scope = TempScope::new(&self.temp_dir);
        let input = self
            .fetcher
            .fetch_to_temp(&request.video_url, &scope, "frame-input", "mp4")
            .await?;
        let output = scope.file("frame-output", "png")?;

        let outcome = self.decode(request, &input, &output).await;

        input.release();
        output.release();

        outcome
    }

    async fn decode(
        &self,
        request: &FrameExtractionRequest,
        input: &TempMediaFile,
        output: &TempMediaFile,
    ) -> Result<FrameExtractionResult, TaskError> {
        let duration = if request.unit.needs_duration() {
            Some(self.decoder.probe_duration(input.path()).await?)
        } else {
            None
        };
        let offset = request.seek_offset(duration)?;

        self.decoder.extract_frame(input.path(), offset, output.path()).await?;
        let frame = output.read().await?;

        info!("Extracted {} byte frame at {:.3}s", frame.len(), offset);
        Ok(FrameExtractionResult {
            data_url: encode_png_data_url(&frame),
            timestamp: offset,
        })
    }
}

#[async_trait]
impl TaskProcessor for ExtractFrameProcessor {
    fn task_type(&self) -> TaskType {
        TaskType::ExtractFrame
    }

    fn validate_params(&self, params: &TaskParams) -> Result<(), TaskError> {
        match params {
            TaskParams::ExtractFrame(request) => request.validate(),
            other => Err(mismatched_params(self.task_type(), other)),
        }
    }

    async fn process(&self, task: &Task) -> Result<TaskResult, TaskError> {
        let TaskParams::ExtractFrame(request) = &task.params else {
            return Err(mismatched_params(self.task_type(), &task.params));
        };

        info!(
            "Processing extract-frame task {}: {} at {} {:?}",
            task.id, request.video_url, request.timestamp, request.unit
        );

        match self.extract(request).await {
            Ok(result) => Ok(TaskResult::ExtractFrame(result)),
            Err(e) => {
                warn!("Failed to process task {}: {}", task.id, e);
                Err(e)
            }
        }
    }
}
