//! Core data models used throughout docsync.
//!
//! These types describe the corpus as it flows from the local filesystem
//! to the remote search index: raw documents, the hash snapshot derived
//! from them, the diff between two snapshots, and the size-bounded
//! fragments uploaded to the index.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A markdown document read from the corpus.
///
/// Documents are ephemeral: only their content hash outlives a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Stable identifier, unique within the corpus.
    pub doc_id: String,
    /// Raw file content.
    pub content: String,
}

/// Point-in-time mapping from docID to content hash (hex SHA-256).
///
/// Keys keep insertion order, which is the order the diff reports
/// documents in. Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashSnapshot(IndexMap<String, String>);

impl HashSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `hash` for `doc_id`, returning the previous hash if the ID
    /// was already present.
    pub fn insert(&mut self, doc_id: impl Into<String>, hash: impl Into<String>) -> Option<String> {
        self.0.insert(doc_id.into(), hash.into())
    }

    pub fn get(&self, doc_id: &str) -> Option<&str> {
        self.0.get(doc_id).map(String::as_str)
    }

    pub fn contains(&self, doc_id: &str) -> bool {
        self.0.contains_key(doc_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(doc_id, hash)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HashSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Classification of docIDs between a new and an old snapshot.
///
/// Immutable once computed. `change_id` is a fresh random identifier
/// minted per diff and used to tag the published index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
    #[serde(rename = "changeID")]
    pub change_id: String,
}

impl Diff {
    /// True when no document was added, changed, or deleted.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    /// DocIDs whose content must be (re)uploaded: added then changed.
    pub fn upserts(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(self.changed.iter())
            .map(String::as_str)
    }
}

/// A document prepared for indexing, before fragmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexObject {
    #[serde(rename = "docID")]
    pub doc_id: String,
    /// Opaque metadata copied onto every fragment.
    pub data: Value,
    #[serde(rename = "rawTextContent")]
    pub raw_text_content: String,
}

/// A size-bounded slice of one document, indexed as its own record.
///
/// All fragments of a document share its `doc_id` and `data`; their
/// `raw_text_content` concatenated in emission order is the full text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    #[serde(rename = "docID")]
    pub doc_id: String,
    pub data: Value,
    #[serde(rename = "rawTextContent")]
    pub raw_text_content: String,
}
