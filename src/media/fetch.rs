use reqwest::Client;
use tracing::info;

use super::temp::{TempMediaFile, TempScope};
use crate::config::MediaConfig;
use crate::error::TaskError;
use crate::utils::http::build_client;

/// Downloads remote media into scoped temp files.
///
/// Any reachable URL is fetched; there is no allowlist.
#[derive(Clone)]
pub struct MediaFetcher {
    client: Client,
}

impl MediaFetcher {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            client: build_client(config.fetch_timeout),
        }
    }

    /// Fetches `url` with a single GET and writes the whole body to a new
    /// file reserved in `scope`. A partially written file is removed when
    /// the returned error drops the guard.
    pub async fn fetch_to_temp(
        &self,
        url: &str,
        scope: &TempScope,
        prefix: &str,
        extension: &str,
    ) -> Result<TempMediaFile, TaskError> {
        info!("Starting download from URL: {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(TaskError::Fetch {
                status: response.status().as_u16(),
            });
        }

        let bytes = response.bytes().await?;

        let file = scope.file(prefix, extension)?;
        file.write(&bytes).await?;

        info!("Downloaded {} bytes to {}", bytes.len(), file.path().display());
        Ok(file)
    }
}
