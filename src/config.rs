//! TOML configuration.
//!
//! A single file (default `./docsync.toml`) describes where the corpus
//! lives, how file names become docIDs, how to reach the search index, and
//! how publishing and snapshot persistence behave. The parsed [`Config`]
//! is passed explicitly to every component.
//!
//! ```toml
//! [corpus]
//! path = "./posts"
//! include_globs = ["*.md"]
//! naming = "file_stem"
//!
//! [index]
//! app_id = "ABCDEF1234"
//! index_prefix = "blog_"
//!
//! [index.settings]
//! searchableAttributes = ["rawTextContent"]
//! attributesForFaceting = ["docID"]
//!
//! [publish]
//! fragment_size = 9000
//!
//! [cleanup]
//! version_url = "https://example.com/version.json"
//! ```

use anyhow::{bail, Result};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::retry::RetryPolicy;
use crate::snapshot::PersistPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    pub index: IndexConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub path: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub naming: DocIdNaming,
    #[serde(default)]
    pub doc_id_prefix: String,
}

fn default_include_globs() -> Vec<String> {
    vec!["*.md".to_string()]
}

/// How a corpus file maps to its docID.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocIdNaming {
    /// `posts/hello-world.md` → `hello-world.md`
    #[default]
    FileName,
    /// `posts/hello-world.md` → `hello-world`
    FileStem,
    /// Path relative to the corpus root, `/`-separated.
    RelativePath,
}

impl CorpusConfig {
    /// Derive the docID for a file at `relative` (relative to the corpus root).
    pub fn doc_id(&self, relative: &Path) -> String {
        let base = match self.naming {
            DocIdNaming::FileName => relative
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            DocIdNaming::FileStem => relative
                .file_stem()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default(),
            DocIdNaming::RelativePath => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
        };
        format!("{}{}", self.doc_id_prefix, base)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    pub app_id: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Override for the REST endpoint, e.g. a proxy or a local fake.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub index_prefix: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Forwarded to the backend's settings endpoint. `docID` is added to
    /// `attributesForFaceting` when the key is absent, since deletions
    /// filter on it.
    #[serde(default = "default_settings")]
    pub settings: Value,
}

fn default_api_key_env() -> String {
    "ALGOLIA_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_settings() -> Value {
    Value::Object(serde_json::Map::new())
}

impl IndexConfig {
    /// Name of the index published for `change_id`.
    pub fn index_name_for(&self, change_id: &str) -> String {
        format!("{}{}", self.index_prefix, change_id)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublishConfig {
    #[serde(default = "default_fragment_size")]
    pub fragment_size: usize,
    #[serde(default = "default_delete_delay_ms")]
    pub delete_delay_ms: u64,
    #[serde(default = "default_delete_max_attempts")]
    pub delete_max_attempts: u32,
    #[serde(default = "default_delete_max_delay_ms")]
    pub delete_max_delay_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            fragment_size: default_fragment_size(),
            delete_delay_ms: default_delete_delay_ms(),
            delete_max_attempts: default_delete_max_attempts(),
            delete_max_delay_ms: default_delete_max_delay_ms(),
        }
    }
}

fn default_fragment_size() -> usize {
    docsync_core::fragment::DEFAULT_FRAGMENT_SIZE
}
fn default_delete_delay_ms() -> u64 {
    3000
}
fn default_delete_max_attempts() -> u32 {
    8
}
fn default_delete_max_delay_ms() -> u64 {
    60_000
}

impl PublishConfig {
    /// Retry policy for the deletion query.
    pub fn delete_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.delete_delay_ms),
            Duration::from_millis(self.delete_max_delay_ms),
            self.delete_max_attempts,
        )
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    Always,
    Never,
    #[default]
    UnlessEnv,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub persist: PersistMode,
    #[serde(default = "default_skip_env_var")]
    pub skip_env_var: String,
    #[serde(default = "default_skip_env_value")]
    pub skip_env_value: String,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: default_snapshot_dir(),
            persist: PersistMode::default(),
            skip_env_var: default_skip_env_var(),
            skip_env_value: default_skip_env_value(),
        }
    }
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("_change-log")
}
fn default_skip_env_var() -> String {
    "DOCSYNC_ENV".to_string()
}
fn default_skip_env_value() -> String {
    "development".to_string()
}

impl SnapshotConfig {
    pub fn persist_policy(&self) -> PersistPolicy {
        match self.persist {
            PersistMode::Always => PersistPolicy::Always,
            PersistMode::Never => PersistPolicy::Never,
            PersistMode::UnlessEnv => PersistPolicy::UnlessEnv {
                var: self.skip_env_var.clone(),
                value: self.skip_env_value.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CleanupConfig {
    #[serde(default)]
    pub version_url: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SyncError::Config(format!(
            "failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config = toml::from_str(content)
        .map_err(|e| SyncError::Config(format!("failed to parse config file: {}", e)))?;

    if config.publish.fragment_size == 0 {
        bail!(SyncError::Config(
            "publish.fragment_size must be > 0".to_string()
        ));
    }

    if config.publish.delete_max_attempts == 0 {
        bail!(SyncError::Config(
            "publish.delete_max_attempts must be >= 1".to_string()
        ));
    }

    if config.publish.delete_max_delay_ms < config.publish.delete_delay_ms {
        bail!(SyncError::Config(
            "publish.delete_max_delay_ms must be >= publish.delete_delay_ms".to_string()
        ));
    }

    if config.index.app_id.trim().is_empty() {
        bail!(SyncError::Config("index.app_id must not be empty".to_string()));
    }

    ensure_doc_id_faceting(&mut config.index.settings)?;

    if config.corpus.include_globs.is_empty() {
        bail!(SyncError::Config(
            "corpus.include_globs must not be empty".to_string()
        ));
    }

    Ok(config)
}

/// Facet declarations under which a `docID:"..."` filter matches records.
const DOC_ID_FACETS: &[&str] = &["docID", "filterOnly(docID)", "searchable(docID)"];

/// The backend answers a filter on an unfaceted attribute with zero hits,
/// not an error, which would make every purge a silent no-op.
fn ensure_doc_id_faceting(settings: &mut Value) -> Result<()> {
    let Some(table) = settings.as_object_mut() else {
        bail!(SyncError::Config("index.settings must be a table".to_string()));
    };

    match table.get("attributesForFaceting") {
        None => {
            table.insert(
                "attributesForFaceting".to_string(),
                Value::from(vec!["filterOnly(docID)"]),
            );
        }
        Some(Value::Array(facets)) => {
            let faceted = facets
                .iter()
                .filter_map(Value::as_str)
                .any(|facet| DOC_ID_FACETS.contains(&facet));
            if !faceted {
                bail!(SyncError::Config(
                    "index.settings.attributesForFaceting must include \"filterOnly(docID)\""
                        .to_string()
                ));
            }
        }
        Some(_) => {
            bail!(SyncError::Config(
                "index.settings.attributesForFaceting must be an array".to_string()
            ));
        }
    }
    Ok(())
}
