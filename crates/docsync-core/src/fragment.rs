//! Fixed-size document fragmenter.
//!
//! The hosted index rejects records above a size threshold, so each
//! [`IndexObject`] is split into consecutive, non-overlapping slices of at
//! most `fragment_size` characters. Every slice becomes a [`Fragment`]
//! carrying the original `doc_id` and `data`, which keeps any match inside
//! the document searchable. Deleting a document therefore means deleting
//! every record with its `doc_id`.
//!
//! # Guarantees
//!
//! - A document of `L` characters yields `ceil(L / fragment_size)` fragments
//!   (zero for empty content).
//! - Concatenating a document's fragments in emission order reproduces its
//!   content exactly.
//! - Splits land on `char` boundaries; lengths are counted in `char`s.
//!
//! # Example
//!
//! ```rust
//! use docsync_core::fragment::fragment_objects;
//! use docsync_core::models::IndexObject;
//!
//! let objects = vec![IndexObject {
//!     doc_id: "foobar".into(),
//!     data: serde_json::json!({}),
//!     raw_text_content: "lorem ipsum".repeat(9000),
//! }];
//! let fragments = fragment_objects(&objects, 9000);
//! assert_eq!(fragments.len(), 11);
//! ```

use crate::models::{Fragment, IndexObject};

/// Default maximum fragment length, in characters.
pub const DEFAULT_FRAGMENT_SIZE: usize = 9000;

/// Split every object into fragments of at most `fragment_size` characters.
///
/// Fragments are emitted object by object, in input order.
///
/// # Panics
///
/// Panics if `fragment_size` is zero. Configuration loading rejects a
/// zero size before it can reach this function.
pub fn fragment_objects(objects: &[IndexObject], fragment_size: usize) -> Vec<Fragment> {
    assert!(fragment_size > 0, "fragment_size must be > 0");

    let mut fragments = Vec::new();
    for object in objects {
        for slice in split_by_char_len(&object.raw_text_content, fragment_size) {
            fragments.push(Fragment {
                doc_id: object.doc_id.clone(),
                data: object.data.clone(),
                raw_text_content: slice.to_string(),
            });
        }
    }
    fragments
}

/// Split `text` into consecutive slices of at most `max_chars` characters.
pub fn split_by_char_len(text: &str, max_chars: usize) -> Vec<&str> {
    let mut slices = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == max_chars {
            slices.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        slices.push(&text[start..]);
    }
    slices
}
