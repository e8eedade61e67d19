//! Snapshot differ.
//!
//! Compares a freshly computed [`HashSnapshot`] against the previously
//! recorded one and classifies every docID:
//!
//! | In new | In old | Hashes | Result |
//! |--------|--------|--------|--------|
//! | yes | no | - | `added` |
//! | yes | yes | differ | `changed` |
//! | yes | yes | equal | omitted |
//! | no | yes | - | `deleted` |
//!
//! `added` and `changed` follow the key order of the new snapshot,
//! `deleted` the key order of the old one. No sorting is applied.
//!
//! Diffing has no side effects. Persisting the result is a separate,
//! explicit step performed by the caller.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::diff::diff_snapshots;
//! use docsync_core::models::HashSnapshot;
//!
//! let new: HashSnapshot = [("a", "1"), ("b", "2")].into_iter().collect();
//! let old: HashSnapshot = [("a", "0"), ("c", "3")].into_iter().collect();
//!
//! let diff = diff_snapshots(&new, &old);
//! assert_eq!(diff.added, vec!["b"]);
//! assert_eq!(diff.changed, vec!["a"]);
//! assert_eq!(diff.deleted, vec!["c"]);
//! ```

use uuid::Uuid;

use crate::models::{Diff, HashSnapshot};

/// Diff `new` against `old`, minting a fresh random `change_id`.
///
/// A change ID is generated even when nothing changed.
pub fn diff_snapshots(new: &HashSnapshot, old: &HashSnapshot) -> Diff {
    diff_snapshots_with_id(new, old, Uuid::new_v4().to_string())
}

/// Diff `new` against `old` using a caller-supplied `change_id`.
pub fn diff_snapshots_with_id(
    new: &HashSnapshot,
    old: &HashSnapshot,
    change_id: impl Into<String>,
) -> Diff {
    let mut added = Vec::new();
    let mut changed = Vec::new();

    for (doc_id, new_hash) in new.iter() {
        match old.get(doc_id) {
            None => added.push(doc_id.to_string()),
            Some(old_hash) if old_hash != new_hash => changed.push(doc_id.to_string()),
            Some(_) => {}
        }
    }

    let deleted = old
        .doc_ids()
        .filter(|doc_id| !new.contains(doc_id))
        .map(str::to_string)
        .collect();

    Diff {
        added,
        changed,
        deleted,
        change_id: change_id.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_content;
    use std::collections::HashSet;

    fn snapshot(entries: &[(&str, &str)]) -> HashSnapshot {
        entries
            .iter()
            .map(|(id, content)| (*id, hash_content(content)))
            .collect()
    }

    #[test]
    fn test_classifies_added_changed_deleted() {
        let new = snapshot(&[("doc-1.md", ""), ("doc-2.md", ""), ("doc-4.md", "")]);
        let old = snapshot(&[("doc-1.md", "content foobar"), ("doc-3.md", "")]);

        let diff = diff_snapshots(&new, &old);
        assert_eq!(diff.added, vec!["doc-2.md", "doc-4.md"]);
        assert_eq!(diff.changed, vec!["doc-1.md"]);
        assert_eq!(diff.deleted, vec!["doc-3.md"]);
    }

    #[test]
    fn test_unchanged_documents_are_omitted() {
        let new = snapshot(&[("same.md", "x"), ("edited.md", "new")]);
        let old = snapshot(&[("same.md", "x"), ("edited.md", "old")]);

        let diff = diff_snapshots(&new, &old);
        assert!(diff.added.is_empty());
        assert_eq!(diff.changed, vec!["edited.md"]);
        assert!(diff.deleted.is_empty());
        assert!(!diff.upserts().any(|id| id == "same.md"));
    }

    #[test]
    fn test_empty_old_snapshot_adds_everything() {
        let new = snapshot(&[("a.md", "a"), ("b.md", "b")]);
        let diff = diff_snapshots(&new, &HashSnapshot::new());
        assert_eq!(diff.added, vec!["a.md", "b.md"]);
        assert!(diff.changed.is_empty());
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_empty_new_snapshot_deletes_everything() {
        let old = snapshot(&[("a.md", "a"), ("b.md", "b")]);
        let diff = diff_snapshots(&HashSnapshot::new(), &old);
        assert_eq!(diff.deleted, vec!["a.md", "b.md"]);
        assert!(diff.added.is_empty());
    }

    #[test]
    fn test_categories_are_disjoint() {
        let new = snapshot(&[("a", "1"), ("b", "2"), ("c", "3"), ("e", "5")]);
        let old = snapshot(&[("a", "1"), ("b", "x"), ("d", "4"), ("e", "y")]);
        let diff = diff_snapshots(&new, &old);

        let added: HashSet<_> = diff.added.iter().collect();
        let changed: HashSet<_> = diff.changed.iter().collect();
        let deleted: HashSet<_> = diff.deleted.iter().collect();
        assert!(added.is_disjoint(&changed));
        assert!(added.is_disjoint(&deleted));
        assert!(changed.is_disjoint(&deleted));
        assert_eq!(diff.added, vec!["c"]);
        assert_eq!(diff.changed, vec!["b", "e"]);
        assert_eq!(diff.deleted, vec!["d"]);
    }

    #[test]
    fn test_change_id_fresh_even_without_changes() {
        let s = snapshot(&[("a.md", "a")]);
        let d1 = diff_snapshots(&s, &s);
        let d2 = diff_snapshots(&s, &s);
        assert!(d1.is_empty());
        assert!(!d1.change_id.is_empty());
        assert_ne!(d1.change_id, d2.change_id);
    }

    #[test]
    fn test_order_follows_snapshot_keys_not_sorted() {
        let new = snapshot(&[("zeta", "1"), ("alpha", "2"), ("mid", "3")]);
        let diff = diff_snapshots(&new, &HashSnapshot::new());
        assert_eq!(diff.added, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_diff_json_shape() {
        let new = snapshot(&[("a", "1")]);
        let diff = diff_snapshots_with_id(&new, &HashSnapshot::new(), "abc");
        let json = serde_json::to_value(&diff).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "added": ["a"],
                "changed": [],
                "deleted": [],
                "changeID": "abc"
            })
        );
    }
}
