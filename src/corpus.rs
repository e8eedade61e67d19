//! Markdown corpus scanner.
//!
//! Walks the configured corpus directory, keeps files matching the include
//! globs, and turns each one into a [`Document`] whose docID comes from the
//! configured naming rule. By default only the top level of the directory
//! is scanned; set `corpus.recursive = true` to descend.
//!
//! Documents are returned sorted by docID so snapshots, diffs and uploads
//! are reproducible between runs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::error::SyncError;
use crate::models::{Document, HashSnapshot, IndexObject};
use docsync_core::hash::hash_documents;

/// Scan the corpus directory into documents.
pub fn scan_corpus(config: &CorpusConfig) -> Result<Vec<Document>, SyncError> {
    let root = &config.path;
    let read_err = |reason: String| SyncError::Read {
        path: root.clone(),
        reason,
    };

    if !root.is_dir() {
        return Err(read_err("not a directory".to_string()));
    }

    let include_set = build_globset(&config.include_globs)
        .map_err(|e| SyncError::Config(format!("invalid corpus.include_globs: {}", e)))?;

    let mut walker = WalkDir::new(root).min_depth(1);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut documents = Vec::new();
    let mut seen: HashMap<String, String> = HashMap::new();

    for entry in walker {
        let entry = entry.map_err(|e| read_err(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if !include_set.is_match(&rel_str) {
            continue;
        }

        let doc_id = config.doc_id(relative);
        if let Some(previous) = seen.insert(doc_id.clone(), rel_str.clone()) {
            return Err(read_err(format!(
                "docID '{}' produced by both {} and {}",
                doc_id, previous, rel_str
            )));
        }

        documents.push(read_document(path, doc_id)?);
    }

    documents.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
    Ok(documents)
}

/// Scan the corpus and hash every document.
pub fn hash_corpus(config: &CorpusConfig) -> Result<(Vec<Document>, HashSnapshot), SyncError> {
    let documents = scan_corpus(config)?;
    let snapshot = hash_documents(&documents);
    Ok((documents, snapshot))
}

/// Build index objects for the documents named in `doc_ids`, in that order.
///
/// IDs without a matching document are skipped.
pub fn index_objects<'a>(
    documents: &[Document],
    doc_ids: impl IntoIterator<Item = &'a str>,
) -> Vec<IndexObject> {
    let by_id: HashMap<&str, &Document> = documents
        .iter()
        .map(|doc| (doc.doc_id.as_str(), doc))
        .collect();

    doc_ids
        .into_iter()
        .filter_map(|id| by_id.get(id))
        .map(|doc| IndexObject {
            doc_id: doc.doc_id.clone(),
            data: json!({ "docID": doc.doc_id }),
            raw_text_content: doc.content.clone(),
        })
        .collect()
}

fn read_document(path: &Path, doc_id: String) -> Result<Document, SyncError> {
    let content = std::fs::read_to_string(path).map_err(|e| SyncError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(Document { doc_id, content })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    builder.build()
}
