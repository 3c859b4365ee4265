//! Domain model structs persisted in the SQLite database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the HTTP layer as a JSON response body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// A named diagram document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Unique, immutable identifier assigned at creation.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// The client-owned document.  Never inspected by the store.
    pub data: Value,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tree summary
// ---------------------------------------------------------------------------

/// Listing projection of a [`Tree`].  Deliberately carries no `data`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeSummary {
    pub id: String,
    pub name: String,
    pub updated_at: DateTime<Utc>,
}
