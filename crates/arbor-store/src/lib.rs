//! # arbor-store
//!
//! SQLite-backed persistence for Arbor tree documents.
//!
//! A tree is a named record holding an opaque JSON document (nodes, edges,
//! decorations, viewport).  The crate exposes a synchronous `Database` handle
//! that wraps a `rusqlite::Connection` and provides typed CRUD helpers for
//! trees, plus the [`document`] module that owns the default document shape
//! and the update-merge rule.

pub mod database;
pub mod document;
pub mod migrations;
pub mod models;
pub mod trees;

mod error;

pub use database::Database;
pub use document::{default_document, TreePatch, DEFAULT_TREE_NAME};
pub use error::{Result, StoreError};
pub use models::*;
