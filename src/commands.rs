//! Top-level commands behind the `docsync` CLI.
//!
//! Each `run_*` function loads what it needs from [`Config`], performs one
//! operation, and prints a short summary on stdout. Diagnostics go through
//! `tracing` on stderr.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cleanup::cleanup_indexes;
use crate::config::Config;
use crate::corpus::hash_corpus;
use crate::error::SyncError;
use crate::index_client::AlgoliaClient;
use crate::models::{Diff, HashSnapshot};
use crate::publish::{PublishPlan, Publisher};
use crate::snapshot::{SnapshotRecord, SnapshotStore};
use crate::version::fetch_active_index;
use docsync_core::diff::diff_snapshots;

/// Hash the corpus and print the snapshot as JSON.
pub fn run_changes(config: &Config) -> Result<()> {
    let (documents, snapshot) = hash_corpus(&config.corpus)?;
    info!(documents = documents.len(), "corpus hashed");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

/// Diff two snapshot files and print the result.
///
/// `old` defaults to the stored snapshot. With `persist`, `new` and the diff
/// are written to the snapshot store, subject to the persist policy. The
/// snapshot is tagged with the index name `publish` would use for this diff
/// (`index_prefix + changeID`); that index is not created here, so it must
/// be published under that name before a later `publish` copies from it.
pub fn run_diff(config: &Config, new: &Path, old: Option<&Path>, persist: bool) -> Result<()> {
    let new_snapshot = read_snapshot_file(new)?;
    let store = SnapshotStore::from_config(&config.snapshot);
    let old_snapshot = match old {
        Some(path) => read_snapshot_file(path)?,
        None => store.load_baseline()?,
    };

    let diff = diff_snapshots(&new_snapshot, &old_snapshot);
    println!("{}", serde_json::to_string_pretty(&diff)?);

    if persist {
        let index_name = config.index.index_name_for(&diff.change_id);
        persist_if_allowed(config, &store, &new_snapshot, &diff, &index_name)?;
    }
    Ok(())
}

/// Read a snapshot from a JSON file.
///
/// Accepts either a bare `{docID: hash}` object or the persisted
/// `{"algoliaIndex", "changes", "timestamp"}` record.
pub fn read_snapshot_file(path: &Path) -> Result<HashSnapshot> {
    let content = std::fs::read_to_string(path).map_err(|e| SyncError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Ok(record) = serde_json::from_str::<SnapshotRecord>(&content) {
        return Ok(record.changes);
    }
    let snapshot = serde_json::from_str::<HashSnapshot>(&content).map_err(|e| SyncError::Read {
        path: path.to_path_buf(),
        reason: format!("not a snapshot: {}", e),
    })?;
    Ok(snapshot)
}

/// Options for [`run_publish`].
#[derive(Debug, Default, Clone)]
pub struct PublishOptions {
    /// Source index; defaults to the index recorded in the stored snapshot.
    pub from: Option<String>,
    /// Target index; defaults to `index_prefix + changeID`.
    pub index: Option<String>,
    pub dry_run: bool,
}

/// Scan, diff against the stored baseline, publish, and persist.
pub async fn run_publish(
    config: &Config,
    options: PublishOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let store = SnapshotStore::from_config(&config.snapshot);
    let previous = store.load()?;
    let baseline = previous
        .as_ref()
        .map(|record| record.changes.clone())
        .unwrap_or_default();

    let (documents, snapshot) = hash_corpus(&config.corpus)?;
    let diff = diff_snapshots(&snapshot, &baseline);

    let target = options
        .index
        .unwrap_or_else(|| config.index.index_name_for(&diff.change_id));
    let from = options.from.or_else(|| {
        previous
            .map(|record| record.index_name)
            .filter(|name| !name.is_empty())
    });

    if options.dry_run || diff.is_empty() {
        println!(
            "publish {}{}",
            target,
            if options.dry_run { " (dry-run)" } else { "" }
        );
        print_diff_counts(&diff);
        println!("  from: {}", from.as_deref().unwrap_or("<new placeholder>"));
        if diff.is_empty() {
            println!("  nothing to publish");
        }
        println!("ok");
        return Ok(());
    }

    let client = AlgoliaClient::from_config(&config.index)?;
    let publisher = Publisher::from_config(&client, &config.index, &config.publish);
    let plan = PublishPlan::from_diff(&diff, &documents, from, target.clone());

    let mut report = publisher
        .publish(&plan, cancel)
        .await
        .with_context(|| format!("publishing to '{}'", target))?;

    println!("publish {}", target);
    println!("  from: {}", report.source_index);
    print_diff_counts(&diff);
    println!("  fragments uploaded: {}", report.fragments_uploaded);
    println!("  records deleted: {}", report.records_deleted);

    if let Some(err) = report.take_error() {
        if let Some(other) = report.take_error() {
            warn!(error = %other, "additional publish failure");
        }
        warn!(index = %target, "snapshot not persisted; the next run will retry this diff");
        return Err(err).with_context(|| format!("index '{}' is partially published", target));
    }

    persist_if_allowed(config, &store, &snapshot, &diff, &target)?;

    println!(
        "  next: activate '{}' (point the version endpoint at it), then run `docsync cleanup`",
        target
    );
    println!("ok");
    Ok(())
}

/// Delete every index except the active one.
///
/// The index to keep is `keep` if given, otherwise what the configured
/// version endpoint reports.
pub async fn run_cleanup(config: &Config, keep: Option<String>) -> Result<()> {
    let keep = match keep {
        Some(name) => name,
        None => {
            let url = config.cleanup.version_url.as_deref().ok_or_else(|| {
                SyncError::Config(
                    "cleanup.version_url must be set (or pass --keep <index>)".to_string(),
                )
            })?;
            fetch_active_index(url, Duration::from_secs(config.index.timeout_secs)).await?
        }
    };

    let client = AlgoliaClient::from_config(&config.index)?;
    let report = cleanup_indexes(&client, &keep).await?;

    println!("cleanup");
    println!("  kept: {}", report.kept);
    println!("  deleted indexes: {}", report.deleted.len());
    for name in &report.deleted {
        println!("    {}", name);
    }

    if !report.failed.is_empty() {
        for (name, err) in &report.failed {
            println!("  failed: {} ({})", name, err);
        }
        bail!("failed to delete {} indexes", report.failed.len());
    }

    println!("ok");
    Ok(())
}

fn print_diff_counts(diff: &Diff) {
    println!("  change id: {}", diff.change_id);
    println!("  added: {}", diff.added.len());
    println!("  changed: {}", diff.changed.len());
    println!("  deleted: {}", diff.deleted.len());
}

fn persist_if_allowed(
    config: &Config,
    store: &SnapshotStore,
    snapshot: &HashSnapshot,
    diff: &Diff,
    index_name: &str,
) -> Result<()> {
    if !config.snapshot.persist_policy().should_persist() {
        info!("snapshot persistence disabled by policy");
        println!("  snapshot: skipped (persist policy)");
        return Ok(());
    }

    let outcome = store.persist(snapshot, diff, index_name)?;
    println!("  snapshot: {}", outcome.snapshot_path.display());
    match (&outcome.diff_path, &outcome.diff_error) {
        (Some(path), _) => println!("  last diff: {}", path.display()),
        (None, Some(err)) => println!("  last diff: not written ({})", err),
        (None, None) => {}
    }
    Ok(())
}
