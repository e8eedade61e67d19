//! # docsync
//!
//! Keeps a hosted full-text search index in sync with a local directory of
//! markdown documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐
//! │  Corpus  │──▶│  Hasher  │──▶│  Differ  │──▶│ Publisher │──▶ new index
//! │  *.md    │   │ SHA-256  │   │ vs. last │   │ copy+load │
//! └──────────┘   └──────────┘   └────┬─────┘   └───────────┘
//!                                    ▼
//!                              ┌───────────┐
//!                              │ Snapshot  │  _change-log/
//!                              │   Store   │
//!                              └───────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. The **corpus scanner** ([`corpus`]) reads markdown files and names
//!    each one with a docID.
//! 2. Content is hashed ([`hash`]) into a [`models::HashSnapshot`].
//! 3. The **differ** ([`diff`]) compares it with the stored snapshot and
//!    classifies docIDs as added, changed, or deleted.
//! 4. The **publisher** ([`publish`]) copies the current index into a new
//!    one, uploads fragments ([`fragment`]) of added and changed documents,
//!    and purges records of deleted ones.
//! 5. The **snapshot store** ([`snapshot`]) persists the new baseline.
//! 6. After the new index is activated externally, **cleanup**
//!    ([`cleanup`]) removes every other index.
//!
//! ## Quick Start
//!
//! ```bash
//! docsync changes                 # print the corpus hash snapshot
//! docsync publish --dry-run       # show what would be published
//! docsync publish                 # publish the delta to a new index
//! docsync cleanup                 # drop indexes other than the active one
//! ```

pub mod cleanup;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod error;
pub mod index_client;
pub mod publish;
pub mod retry;
pub mod snapshot;
pub mod version;

pub use docsync_core::{diff, fragment, hash, models};

#[cfg(test)]
mod fake_index;
