//! Content hashing.
//!
//! Documents are fingerprinted with SHA-256 over their UTF-8 bytes and
//! rendered as lowercase hex. The same content always yields the same
//! digest, so a digest change is the signal that a document changed.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::hash::hash_content;
//!
//! let h = hash_content("foo");
//! assert_eq!(h.len(), 64);
//! assert_eq!(h, hash_content("foo"));
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Document, HashSnapshot};

/// SHA-256 of `content`, hex encoded.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Build a [`HashSnapshot`] mapping each document's ID to its content hash.
///
/// Snapshot order follows the order of `documents`. A repeated docID keeps
/// its first position and takes the hash of its last occurrence; callers
/// that need uniqueness must check before hashing.
pub fn hash_documents(documents: &[Document]) -> HashSnapshot {
    documents
        .iter()
        .map(|doc| (doc.doc_id.clone(), hash_content(&doc.content)))
        .collect()
}
