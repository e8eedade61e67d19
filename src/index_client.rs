//! Hosted search index client.
//!
//! [`SearchIndex`] lists exactly the backend operations the publish and
//! cleanup steps consume. [`AlgoliaClient`] implements them against the
//! Algolia REST API (`/1/indexes/...`) using `reqwest`.
//!
//! # Authentication
//!
//! Requests carry `X-Algolia-Application-Id` (from `index.app_id`) and
//! `X-Algolia-API-Key`, read from the environment variable named by
//! `index.api_key_env` (default `ALGOLIA_API_KEY`). The key needs
//! `addObject`, `deleteObject`, `deleteIndex`, `listIndexes`, `browse`
//! and `editSettings` ACLs.
//!
//! # Consistency
//!
//! Writes are acknowledged before they are applied. A freshly copied index
//! may reject queries for a while; callers that read after writing must
//! retry (see [`crate::publish`]).

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

use crate::config::IndexConfig;
use crate::error::SyncError;
use crate::models::Fragment;

/// Hits requested per browse round trip.
const BROWSE_HITS_PER_PAGE: usize = 1000;

#[derive(Error, Debug)]
pub enum IndexApiError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(String),
}

/// Backend operations used by publish and cleanup.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Store one record under an explicit object ID, creating the index if needed.
    async fn add_object_with_id(
        &self,
        index: &str,
        object_id: &str,
        object: Value,
    ) -> Result<(), IndexApiError>;

    /// Copy `from` (records and settings) into `to`, replacing `to`.
    async fn copy_index(&self, from: &str, to: &str) -> Result<(), IndexApiError>;

    async fn set_settings(&self, index: &str, settings: &Value) -> Result<(), IndexApiError>;

    /// Bulk-add records; returns the object IDs assigned by the backend.
    async fn add_objects(
        &self,
        index: &str,
        records: &[Fragment],
    ) -> Result<Vec<String>, IndexApiError>;

    /// Object IDs of every record matching `filters`, however many there
    /// are.
    async fn search_object_ids(
        &self,
        index: &str,
        filters: &str,
    ) -> Result<Vec<String>, IndexApiError>;

    async fn delete_objects(&self, index: &str, object_ids: &[String])
        -> Result<(), IndexApiError>;

    async fn list_indexes(&self) -> Result<Vec<String>, IndexApiError>;

    async fn delete_index(&self, index: &str) -> Result<(), IndexApiError>;
}

/// [`SearchIndex`] over the Algolia REST API.
pub struct AlgoliaClient {
    http: reqwest::Client,
    base_url: Url,
    app_id: String,
    api_key: String,
}

impl AlgoliaClient {
    /// Build a client from configuration, reading the API key from the
    /// environment.
    pub fn from_config(config: &IndexConfig) -> Result<Self, SyncError> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            SyncError::Config(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::new(config, api_key)
    }

    pub fn new(config: &IndexConfig, api_key: String) -> Result<Self, SyncError> {
        let base = config
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}.algolia.net", config.app_id));
        let base_url = Url::parse(&base)
            .map_err(|e| SyncError::Config(format!("invalid index base url '{}': {}", base, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "invalid index base url '{}'",
                base
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            app_id: config.app_id.clone(),
            api_key,
        })
    }

    /// `{base}/1/indexes/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("1").push("indexes").extend(segments);
        }
        url
    }

    async fn send(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value, IndexApiError> {
        let mut request = self
            .http
            .request(method, url)
            .header("X-Algolia-Application-Id", &self.app_id)
            .header("X-Algolia-API-Key", &self.api_key);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| IndexApiError::Decode(e.to_string()))
    }

    async fn batch(&self, index: &str, requests: Vec<Value>) -> Result<Value, IndexApiError> {
        let url = self.url(&[index, "batch"]);
        self.send(Method::POST, url, Some(json!({ "requests": requests })))
            .await
    }
}

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(rename = "objectIDs", default)]
    object_ids: Vec<String>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(rename = "objectID")]
    object_id: String,
}

#[derive(Deserialize)]
struct BrowseResponse {
    hits: Vec<SearchHit>,
    /// Present while more hits remain.
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct IndexItem {
    name: String,
}

#[derive(Deserialize)]
struct ListResponse {
    items: Vec<IndexItem>,
    #[serde(rename = "nbPages", default)]
    nb_pages: usize,
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, IndexApiError> {
    serde_json::from_value(value).map_err(|e| IndexApiError::Decode(e.to_string()))
}

#[async_trait]
impl SearchIndex for AlgoliaClient {
    async fn add_object_with_id(
        &self,
        index: &str,
        object_id: &str,
        object: Value,
    ) -> Result<(), IndexApiError> {
        let url = self.url(&[index, object_id]);
        self.send(Method::PUT, url, Some(object)).await?;
        Ok(())
    }

    async fn copy_index(&self, from: &str, to: &str) -> Result<(), IndexApiError> {
        let url = self.url(&[from, "operation"]);
        let body = json!({ "operation": "copy", "destination": to });
        self.send(Method::POST, url, Some(body)).await?;
        Ok(())
    }

    async fn set_settings(&self, index: &str, settings: &Value) -> Result<(), IndexApiError> {
        let url = self.url(&[index, "settings"]);
        self.send(Method::PUT, url, Some(settings.clone())).await?;
        Ok(())
    }

    async fn add_objects(
        &self,
        index: &str,
        records: &[Fragment],
    ) -> Result<Vec<String>, IndexApiError> {
        let requests = records
            .iter()
            .map(|record| {
                serde_json::to_value(record)
                    .map(|body| json!({ "action": "addObject", "body": body }))
                    .map_err(|e| IndexApiError::Decode(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let response: BatchResponse = decode(self.batch(index, requests).await?)?;
        Ok(response.object_ids)
    }

    /// Uses the browse endpoint: regular queries stop at the index's
    /// pagination limit (1000 hits by default), browse cursors do not.
    async fn search_object_ids(
        &self,
        index: &str,
        filters: &str,
    ) -> Result<Vec<String>, IndexApiError> {
        let url = self.url(&[index, "browse"]);
        let mut object_ids = Vec::new();
        let mut body = json!({
            "filters": filters,
            "hitsPerPage": BROWSE_HITS_PER_PAGE,
            "attributesToRetrieve": ["objectID"],
        });

        loop {
            let response: BrowseResponse =
                decode(self.send(Method::POST, url.clone(), Some(body)).await?)?;
            object_ids.extend(response.hits.into_iter().map(|hit| hit.object_id));

            match response.cursor {
                Some(cursor) if !cursor.is_empty() => body = json!({ "cursor": cursor }),
                _ => break,
            }
        }

        Ok(object_ids)
    }

    async fn delete_objects(
        &self,
        index: &str,
        object_ids: &[String],
    ) -> Result<(), IndexApiError> {
        let requests = object_ids
            .iter()
            .map(|id| json!({ "action": "deleteObject", "body": { "objectID": id } }))
            .collect();
        self.batch(index, requests).await?;
        Ok(())
    }

    async fn list_indexes(&self) -> Result<Vec<String>, IndexApiError> {
        let mut names = Vec::new();
        let mut page = 0;

        loop {
            let mut url = self.url(&[]);
            url.query_pairs_mut().append_pair("page", &page.to_string());
            let response: ListResponse = decode(self.send(Method::GET, url, None).await?)?;
            names.extend(response.items.into_iter().map(|item| item.name));

            page += 1;
            if page >= response.nb_pages {
                break;
            }
        }

        Ok(names)
    }

    async fn delete_index(&self, index: &str) -> Result<(), IndexApiError> {
        let url = self.url(&[index]);
        self.send(Method::DELETE, url, None).await?;
        Ok(())
    }
}
