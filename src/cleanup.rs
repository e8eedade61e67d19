//! Stale index cleanup.
//!
//! Every publish creates a new index, so old ones pile up. Cleanup lists
//! all indexes and deletes each one whose name differs from the index
//! currently in use. Deletions are irreversible: run this only after the
//! new index has been published and activated.
//!
//! Every index in the application is a candidate, not only those with
//! `index.index_prefix`. A pass whose index to keep does not exist is
//! refused, since it would leave the application without any index.

use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::index_client::SearchIndex;

/// Outcome of a cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub kept: String,
    pub deleted: Vec<String>,
    /// Indexes that could not be deleted, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Delete every index except `current_index`.
///
/// Listing failures abort the pass, as does a `current_index` missing from
/// the listing. Individual delete failures are logged and collected; the
/// remaining indexes are still attempted.
pub async fn cleanup_indexes(
    client: &dyn SearchIndex,
    current_index: &str,
) -> Result<CleanupReport, SyncError> {
    if current_index.trim().is_empty() {
        return Err(SyncError::Config(
            "refusing to clean up without an index to keep".to_string(),
        ));
    }

    let names = client.list_indexes().await?;
    if !names.iter().any(|name| name == current_index) {
        error!(
            index = current_index,
            indexes = names.len(),
            "active index not found among listed indexes; nothing deleted"
        );
        return Err(SyncError::Config(format!(
            "active index '{}' does not exist; refusing to delete {} other indexes",
            current_index,
            names.len()
        )));
    }

    let mut report = CleanupReport {
        kept: current_index.to_string(),
        ..Default::default()
    };

    for name in names.into_iter().filter(|name| name != current_index) {
        match client.delete_index(&name).await {
            Ok(()) => {
                info!(index = %name, "deleted index");
                report.deleted.push(name);
            }
            Err(e) => {
                warn!(index = %name, error = %e, "failed to delete index");
                report.failed.push((name, e.to_string()));
            }
        }
    }

    Ok(report)
}
