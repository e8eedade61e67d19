//! Version endpoint lookup.
//!
//! The deployed site exposes a small JSON document naming the index it
//! currently queries:
//!
//! ```json
//! { "algoliaIndex": "blog_0f1c2d3e-..." }
//! ```
//!
//! Cleanup keeps that index and removes every other one.

use serde::Deserialize;
use std::time::Duration;

use crate::error::SyncError;

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "algoliaIndex")]
    algolia_index: String,
}

/// Fetch the name of the currently active index from `url`.
pub async fn fetch_active_index(url: &str, timeout: Duration) -> Result<String, SyncError> {
    let version_err = |reason: String| SyncError::Version {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| version_err(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| version_err(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(version_err(format!("HTTP {}", status)));
    }

    let body: VersionResponse = response
        .json()
        .await
        .map_err(|e| version_err(format!("invalid response: {}", e)))?;

    if body.algolia_index.trim().is_empty() {
        return Err(version_err("algoliaIndex is empty".to_string()));
    }

    Ok(body.algolia_index)
}
