use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::{Builder, TempPath};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::TaskError;

/// Naming scope for the transient files of one task execution.
///
/// Every file created through a scope carries the same tag, a millisecond
/// timestamp plus a random component, so concurrent runs never collide and a
/// run's leftovers can be found by scanning for the tag.
#[derive(Debug, Clone)]
pub struct TempScope {
    dir: PathBuf,
    tag: String,
}

impl TempScope {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self {
            dir: dir.into(),
            tag: format!("{}-{}", Utc::now().timestamp_millis(), &nonce[..8]),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Creates an empty `<dir>/<prefix>-<tag>.<extension>`.
    pub fn file(&self, prefix: &str, extension: &str) -> Result<TempMediaFile, TaskError> {
        std::fs::create_dir_all(&self.dir)?;
        let file = Builder::new()
            .prefix(&format!("{}-{}", prefix, self.tag))
            .suffix(&format!(".{}", extension))
            .rand_bytes(0)
            .tempfile_in(&self.dir)?;
        Ok(TempMediaFile {
            path: file.into_temp_path(),
        })
    }
}

/// A transient local file owned by exactly one task execution.
///
/// Removed through [`TempMediaFile::release`] on normal exits, or on drop
/// when an error, panic or deadline abandons the owning future first.
/// Removal failures are logged and never surfaced.
#[derive(Debug)]
pub struct TempMediaFile {
    path: TempPath,
}

impl TempMediaFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, bytes: &[u8]) -> Result<(), TaskError> {
        tokio::fs::write(self.path(), bytes).await?;
        Ok(())
    }

    pub async fn read(&self) -> Result<Vec<u8>, TaskError> {
        Ok(tokio::fs::read(self.path()).await?)
    }

    pub fn release(self) {
        let path = self.path.to_path_buf();
        match self.path.close() {
            Ok(()) => debug!("Removed temporary file: {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temporary file {}: {}", path.display(), e),
        }
    }
}
