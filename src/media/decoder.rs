use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::TaskError;

/// Local decode backend used by frame extraction.
#[async_trait]
pub trait FrameDecoder: Send + Sync {
    /// Total playback length of `input` in seconds.
    async fn probe_duration(&self, input: &Path) -> Result<f64, TaskError>;

    /// Seeks `input` to `offset_secs` and writes exactly one PNG frame to `output`.
    async fn extract_frame(&self, input: &Path, offset_secs: f64, output: &Path) -> Result<(), TaskError>;
}

/// `ffprobe`/`ffmpeg` subprocess backend.
///
/// Children are killed if the owning future is dropped, so a task abandoned
/// at its deadline does not leave a decoder running.
#[derive(Debug, Clone)]
pub struct FfmpegDecoder {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegDecoder {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    // ffprobe reports numbers as strings
    duration: Option<String>,
}

/// Reads `format.duration` from `ffprobe -of json` output.
fn parse_probe_duration(stdout: &[u8]) -> Result<f64, TaskError> {
    let output: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| TaskError::Probe(format!("unreadable ffprobe output: {}", e)))?;

    let raw = output
        .format
        .and_then(|format| format.duration)
        .ok_or_else(|| TaskError::Probe("container reports no duration".to_string()))?;

    let duration: f64 = raw
        .trim()
        .parse()
        .map_err(|_| TaskError::Probe(format!("invalid duration: {}", raw)))?;

    if !duration.is_finite() || duration <= 0.0 {
        return Err(TaskError::Probe(format!("invalid duration: {}", raw)));
    }
    Ok(duration)
}

#[async_trait]
impl FrameDecoder for FfmpegDecoder {
    async fn probe_duration(&self, input: &Path) -> Result<f64, TaskError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration", "-of", "json"])
            .arg(input)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TaskError::Probe(format!("failed to execute ffprobe: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TaskError::Probe(format!("ffprobe exited with {}: {}", output.status, stderr.trim())));
        }

        let duration = parse_probe_duration(&output.stdout)?;
        debug!("Probed duration of {}: {}s", input.display(), duration);
        Ok(duration)
    }

    async fn extract_frame(&self, input: &Path, offset_secs: f64, output: &Path) -> Result<(), TaskError> {
        info!("Extracting frame at {}s from {}", offset_secs, input.display());

        let result = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .arg("-ss")
            .arg(format!("{:.3}", offset_secs))
            .arg("-i")
            .arg(input)
            .args(["-frames:v", "1", "-c:v", "png"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| TaskError::Extraction(format!("failed to execute ffmpeg: {}", e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(TaskError::Extraction(format!("ffmpeg exited with {}: {}", result.status, stderr.trim())));
        }

        // seeking past the end exits cleanly without writing a frame
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(TaskError::Extraction(format!(
                "no frame decoded at {}s (offset past end of stream?)",
                offset_secs
            ))),
        }
    }
}
