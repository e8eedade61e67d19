//! Publishing a diff to the hosted index.
//!
//! The live index is never written in place. Each publish copies the
//! current index into a new one, applies the diff there, and leaves
//! switching readers over to an explicit activation step outside this
//! tool (updating the version endpoint or an alias).
//!
//! # Protocol
//!
//! 1. **Source.** Without a source index, create a placeholder index by
//!    writing one throwaway record, and copy from that.
//! 2. **Copy** the source into the target. Failure aborts the publish.
//! 3. **Settings** from `index.settings` are applied to the target.
//! 4. **Upload.** Added and changed documents are split into fragments
//!    (see [`docsync_core::fragment`]) and bulk-uploaded.
//! 5. **Purge.** Records of deleted documents, the previous fragments of
//!    changed documents, and the placeholder record are removed. A
//!    document may span several records, so one query ORs all docIDs
//!    together and every hit is deleted in one bulk call. The new index
//!    answers queries only after it settles, so the query is retried with
//!    bounded exponential backoff ([`RetryPolicy`]) and gives up with
//!    [`SyncError::DeleteGaveUp`].
//!
//! Upload and purge touch disjoint records and run concurrently, except
//! when documents changed: their old fragments must be purged before the
//! new ones land, so the purge runs first.
//!
//! Upload and purge failures do not abort each other. They are collected in
//! the [`PublishReport`] so the operator sees a partially published index.

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{IndexConfig, PublishConfig};
use crate::error::SyncError;
use crate::index_client::SearchIndex;
use crate::models::{Diff, Document, IndexObject};
use crate::retry::{wait_or_cancel, RetryPolicy};
use docsync_core::fragment::fragment_objects;

/// Object ID and docID of the throwaway record used to create a
/// placeholder source index.
pub const PLACEHOLDER_ID: &str = "__tempDoc__";

/// Fragments sent per batch request.
const UPLOAD_BATCH_SIZE: usize = 1000;

/// Everything one publish needs to know.
#[derive(Debug, Clone, Default)]
pub struct PublishPlan {
    /// Index to copy from. `None` creates a placeholder.
    pub from_index: Option<String>,
    pub target_index: String,
    /// Added and changed documents, ready for fragmentation.
    pub objects: Vec<IndexObject>,
    /// Changed docIDs whose previous fragments must be removed.
    pub replaced: Vec<String>,
    /// Deleted docIDs.
    pub deleted: Vec<String>,
}

impl PublishPlan {
    /// Build a plan from a diff and the scanned documents.
    pub fn from_diff(
        diff: &Diff,
        documents: &[Document],
        from_index: Option<String>,
        target_index: impl Into<String>,
    ) -> Self {
        Self {
            from_index,
            target_index: target_index.into(),
            objects: crate::corpus::index_objects(documents, diff.upserts()),
            replaced: diff.changed.clone(),
            deleted: diff.deleted.clone(),
        }
    }
}

/// Result of a publish. Errors here are non-fatal step failures.
#[derive(Debug)]
pub struct PublishReport {
    pub source_index: String,
    pub target_index: String,
    pub placeholder_created: bool,
    pub fragments_uploaded: usize,
    pub records_deleted: usize,
    pub upload_error: Option<SyncError>,
    pub delete_error: Option<SyncError>,
}

impl PublishReport {
    /// True when every step succeeded.
    pub fn is_complete(&self) -> bool {
        self.upload_error.is_none() && self.delete_error.is_none()
    }

    /// Take the first step failure out of the report, if any.
    pub fn take_error(&mut self) -> Option<SyncError> {
        self.upload_error.take().or_else(|| self.delete_error.take())
    }
}

/// Applies [`PublishPlan`]s to a [`SearchIndex`].
pub struct Publisher<'a> {
    client: &'a dyn SearchIndex,
    settings: Value,
    fragment_size: usize,
    delete_retry: RetryPolicy,
}

impl<'a> Publisher<'a> {
    pub fn new(
        client: &'a dyn SearchIndex,
        settings: Value,
        fragment_size: usize,
        delete_retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            settings,
            fragment_size,
            delete_retry,
        }
    }

    pub fn from_config(
        client: &'a dyn SearchIndex,
        index: &IndexConfig,
        publish: &PublishConfig,
    ) -> Self {
        Self::new(
            client,
            index.settings.clone(),
            publish.fragment_size,
            publish.delete_retry(),
        )
    }

    /// Run the publish protocol for `plan`.
    ///
    /// Returns `Err` only when the target index could not be created
    /// (placeholder, copy, or settings failure) or the run was cancelled
    /// before it started. Upload and deletion failures are reported in the
    /// returned [`PublishReport`].
    pub async fn publish(
        &self,
        plan: &PublishPlan,
        cancel: &CancellationToken,
    ) -> Result<PublishReport, SyncError> {
        let target = plan.target_index.as_str();

        let (source, placeholder_created) = match &plan.from_index {
            Some(from) => (from.clone(), false),
            None => (self.create_placeholder(target).await?, true),
        };

        info!(from = %source, to = target, "copying index");
        self.client
            .copy_index(&source, target)
            .await
            .map_err(|e| SyncError::IndexCopy {
                from: source.clone(),
                to: target.to_string(),
                source: e,
            })?;

        self.client.set_settings(target, &self.settings).await?;

        let mut purge_ids: Vec<String> = plan
            .deleted
            .iter()
            .chain(plan.replaced.iter())
            .cloned()
            .collect();
        if placeholder_created {
            purge_ids.push(PLACEHOLDER_ID.to_string());
        }

        let (upload, purge) = if plan.replaced.is_empty() {
            tokio::join!(
                self.upload(target, &plan.objects),
                self.purge(target, &purge_ids, cancel)
            )
        } else {
            let purge = self.purge(target, &purge_ids, cancel).await;
            let upload = self.upload(target, &plan.objects).await;
            (upload, purge)
        };

        let mut report = PublishReport {
            source_index: source,
            target_index: target.to_string(),
            placeholder_created,
            fragments_uploaded: 0,
            records_deleted: 0,
            upload_error: None,
            delete_error: None,
        };

        match upload {
            Ok(n) => report.fragments_uploaded = n,
            Err(e) => {
                if let SyncError::Upload { uploaded, .. } = &e {
                    report.fragments_uploaded = *uploaded;
                }
                warn!(error = %e, "upload failed; index is partially populated");
                report.upload_error = Some(e);
            }
        }
        match purge {
            Ok(n) => report.records_deleted = n,
            Err(e) => {
                warn!(error = %e, "deletion failed; stale records remain");
                report.delete_error = Some(e);
            }
        }

        Ok(report)
    }

    async fn create_placeholder(&self, target: &str) -> Result<String, SyncError> {
        let name = format!("{}__placeholder_{}", target, Uuid::new_v4().simple());
        info!(index = %name, "no source index given; creating placeholder");
        self.client
            .add_object_with_id(
                &name,
                PLACEHOLDER_ID,
                json!({ "docID": PLACEHOLDER_ID, "rawTextContent": "" }),
            )
            .await
            .map_err(|e| SyncError::IndexCopy {
                from: name.clone(),
                to: target.to_string(),
                source: e,
            })?;
        Ok(name)
    }

    /// Upload fragments in batches. On failure the error carries how many
    /// fragments landed before the failing batch.
    async fn upload(&self, index: &str, objects: &[IndexObject]) -> Result<usize, SyncError> {
        let fragments = fragment_objects(objects, self.fragment_size);
        if fragments.is_empty() {
            return Ok(0);
        }

        let mut uploaded = 0;
        for batch in fragments.chunks(UPLOAD_BATCH_SIZE) {
            self.client
                .add_objects(index, batch)
                .await
                .map_err(|e| SyncError::Upload {
                    index: index.to_string(),
                    fragments: fragments.len(),
                    uploaded,
                    source: e,
                })?;
            uploaded += batch.len();
        }

        info!(
            index,
            documents = objects.len(),
            fragments = uploaded,
            "items added"
        );
        Ok(uploaded)
    }

    /// Query-then-delete every record whose docID is in `doc_ids`.
    async fn purge(
        &self,
        index: &str,
        doc_ids: &[String],
        cancel: &CancellationToken,
    ) -> Result<usize, SyncError> {
        if doc_ids.is_empty() {
            return Ok(0);
        }

        let filters = doc_id_filter(doc_ids);
        let policy = self.delete_retry;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let delay = policy.delay_before(attempt);
            if !wait_or_cancel(delay, cancel).await {
                return Err(SyncError::Cancelled(format!(
                    "waiting to query '{}' for deletion",
                    index
                )));
            }

            let object_ids = match self.client.search_object_ids(index, &filters).await {
                Ok(ids) => ids,
                Err(source) => {
                    let err = SyncError::QueryNotReady {
                        index: index.to_string(),
                        source,
                    };
                    if attempt >= policy.max_attempts {
                        return Err(SyncError::DeleteGaveUp {
                            index: index.to_string(),
                            attempts: attempt,
                            last: err.to_string(),
                        });
                    }
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        retry_in_ms = policy.delay_before(attempt + 1).as_millis() as u64,
                        error = %err,
                        "deletion query failed; retrying"
                    );
                    continue;
                }
            };

            if object_ids.is_empty() {
                info!(index, documents = doc_ids.len(), "no records to delete");
                return Ok(0);
            }

            self.client
                .delete_objects(index, &object_ids)
                .await
                .map_err(|e| SyncError::Delete {
                    index: index.to_string(),
                    records: object_ids.len(),
                    source: e,
                })?;

            info!(
                index,
                documents = doc_ids.len(),
                records = object_ids.len(),
                "search items deleted"
            );
            return Ok(object_ids.len());
        }
    }
}

/// Filter matching every fragment of the given docIDs: `(docID:"a" OR docID:"b")`.
pub fn doc_id_filter(doc_ids: &[String]) -> String {
    let clauses: Vec<String> = doc_ids
        .iter()
        .map(|id| {
            let escaped = id.replace('\\', "\\\\").replace('"', "\\\"");
            format!("docID:\"{}\"", escaped)
        })
        .collect();
    format!("({})", clauses.join(" OR "))
}
