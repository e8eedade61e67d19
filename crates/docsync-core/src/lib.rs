//! # docsync core
//!
//! Pure logic shared by the `docsync` CLI: data models, content hashing,
//! snapshot diffing, and fragmentation of oversized documents.
//!
//! This crate performs no filesystem or network I/O and has no async
//! runtime dependency. Everything here is deterministic except the
//! `change_id` minted for each [`models::Diff`].

pub mod diff;
pub mod fragment;
pub mod hash;
pub mod models;
