use std::time::Duration;

use reqwest::{Client, Response};
use tracing::warn;

/// Builds a client with a per-request timeout, falling back to the default
/// client if the TLS backend refuses the builder configuration.
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!("Failed to build HTTP client with timeout, using defaults: {}", e);
            Client::new()
        })
}

/// Drains a failed response into `(status, body)` for diagnostics.
/// The body is kept verbatim; an unreadable body becomes an empty string.
pub async fn error_parts(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    (status, body)
}

/// Joins a base URL and a path without doubling or dropping the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
