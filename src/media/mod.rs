pub mod data_url;
pub mod decoder;
pub mod fetch;
pub mod temp;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;

pub use data_url::{decode_data_url, encode_png_data_url, parse_data_url};
pub use decoder::{FfmpegDecoder, FrameDecoder};
pub use fetch::MediaFetcher;
pub use temp::{TempMediaFile, TempScope};

/// Unit of a frame extraction timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeekUnit {
    #[default]
    Sec,
    Ms,
    /// Percentage of the total duration, which must be probed first.
    Pct,
}

impl SeekUnit {
    pub fn needs_duration(&self) -> bool {
        matches!(self, SeekUnit::Pct)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameExtractionRequest {
    pub video_url: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub unit: SeekUnit,
}

impl FrameExtractionRequest {
    pub fn validate(&self) -> Result<(), TaskError> {
        if self.video_url.trim().is_empty() {
            return Err(TaskError::Validation("videoUrl is required".to_string()));
        }
        if !self.timestamp.is_finite() || self.timestamp < 0.0 {
            return Err(TaskError::Validation(format!(
                "timestamp must be a non-negative number, got {}",
                self.timestamp
            )));
        }
        Ok(())
    }

    /// Resolves the absolute seek offset in seconds.
    ///
    /// `duration` is the probed length in seconds and is only consulted for
    /// percentage offsets, which fail with a probe error without it.
    pub fn seek_offset(&self, duration: Option<f64>) -> Result<f64, TaskError> {
        match self.unit {
            SeekUnit::Sec => Ok(self.timestamp),
            SeekUnit::Ms => Ok(self.timestamp / 1000.0),
            SeekUnit::Pct => {
                let duration = duration.ok_or_else(|| {
                    TaskError::Probe("percentage offset requires a probed duration".to_string())
                })?;
                Ok((self.timestamp / 100.0) * duration)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameExtractionResult {
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Seek offset actually used, in seconds.
    pub timestamp: f64,
}
