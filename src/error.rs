//! Error taxonomy for the sync workflow.
//!
//! Every failure a run can end with maps to one [`SyncError`] variant and a
//! distinct process exit code, so wrappers (CI jobs, deploy scripts) can
//! tell a corpus problem from a half-published index.

use std::path::PathBuf;

use thiserror::Error;

use crate::index_client::IndexApiError;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The corpus directory or one of its files could not be read.
    #[error("failed to read corpus at {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// The snapshot baseline could not be written or loaded.
    #[error("failed to persist snapshot to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copying the source index into the target failed. Nothing was published.
    #[error("failed to copy index '{from}' to '{to}': {source}")]
    IndexCopy {
        from: String,
        to: String,
        #[source]
        source: IndexApiError,
    },

    /// Uploading fragments failed; `uploaded` of `fragments` landed before
    /// the failing batch.
    #[error("failed to upload fragments to '{index}' ({uploaded} of {fragments} uploaded): {source}")]
    Upload {
        index: String,
        fragments: usize,
        uploaded: usize,
        #[source]
        source: IndexApiError,
    },

    /// The target index did not answer the deletion query.
    #[error("index '{index}' not ready for deletion query: {source}")]
    QueryNotReady {
        index: String,
        #[source]
        source: IndexApiError,
    },

    /// The deletion query kept failing until the retry budget ran out.
    #[error("gave up deleting from '{index}' after {attempts} attempts: {last}")]
    DeleteGaveUp {
        index: String,
        attempts: u32,
        last: String,
    },

    /// The bulk delete call itself failed.
    #[error("failed to delete {records} records from '{index}': {source}")]
    Delete {
        index: String,
        records: usize,
        #[source]
        source: IndexApiError,
    },

    /// The run was interrupted while waiting.
    #[error("cancelled while {0}")]
    Cancelled(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The version endpoint could not be queried.
    #[error("version endpoint {url} failed: {reason}")]
    Version { url: String, reason: String },

    /// Any other index call (settings, list, delete index).
    #[error("index request failed: {0}")]
    Index(#[from] IndexApiError),
}

impl SyncError {
    /// Process exit code for this error kind.
    ///
    /// `1` is left for errors outside the taxonomy and `2` for usage errors
    /// reported by the argument parser.
    pub fn exit_code(&self) -> i32 {
        match self {
            SyncError::Config(_) => 3,
            SyncError::Read { .. } => 4,
            SyncError::Persist { .. } => 5,
            SyncError::IndexCopy { .. } => 6,
            SyncError::Upload { .. } => 7,
            SyncError::QueryNotReady { .. } | SyncError::DeleteGaveUp { .. } => 8,
            SyncError::Delete { .. } => 9,
            SyncError::Version { .. } => 10,
            SyncError::Index(_) => 11,
            SyncError::Cancelled(_) => 130,
        }
    }
}

/// Pick the exit code for an error returned from a command.
///
/// Walks the `anyhow` chain looking for a [`SyncError`]; falls back to `1`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<SyncError>())
        .map(SyncError::exit_code)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    fn api_error() -> IndexApiError {
        IndexApiError::Status {
            status: 404,
            body: "Index does not exist".to_string(),
        }
    }

    #[test]
    fn test_read_error_display() {
        let err = SyncError::Read {
            path: PathBuf::from("/posts"),
            reason: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to read corpus at /posts: permission denied"
        );
    }

    #[test]
    fn test_gave_up_display() {
        let err = SyncError::DeleteGaveUp {
            index: "docs_1".to_string(),
            attempts: 5,
            last: "index not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "gave up deleting from 'docs_1' after 5 attempts: index not found"
        );
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = vec![
            SyncError::Config("x".into()),
            SyncError::Read {
                path: PathBuf::from("p"),
                reason: "r".into(),
            },
            SyncError::Persist {
                path: PathBuf::from("p"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            },
            SyncError::IndexCopy {
                from: "a".into(),
                to: "b".into(),
                source: api_error(),
            },
            SyncError::Upload {
                index: "a".into(),
                fragments: 3,
                uploaded: 1,
                source: api_error(),
            },
            SyncError::DeleteGaveUp {
                index: "a".into(),
                attempts: 1,
                last: "l".into(),
            },
            SyncError::Delete {
                index: "a".into(),
                records: 1,
                source: api_error(),
            },
            SyncError::Version {
                url: "u".into(),
                reason: "r".into(),
            },
            SyncError::Index(api_error()),
            SyncError::Cancelled("waiting".into()),
        ];
        let mut codes: Vec<i32> = errors.iter().map(SyncError::exit_code).collect();
        let total = codes.len();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), total);
        assert!(codes.iter().all(|c| *c > 2));
    }

    #[test]
    fn test_exit_code_found_through_context() {
        let err = anyhow::Error::new(SyncError::Config("missing corpus".into()))
            .context("loading configuration");
        assert_eq!(exit_code_for(&err), 3);

        let res: anyhow::Result<()> = Err(SyncError::IndexCopy {
            from: "a".into(),
            to: "b".into(),
            source: api_error(),
        })
        .context("publishing");
        assert_eq!(exit_code_for(&res.unwrap_err()), 6);
    }

    #[test]
    fn test_unknown_error_exits_one() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&err), 1);
    }
}
