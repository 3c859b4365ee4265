//! v001 -- Initial schema creation.
//!
//! Creates the `trees` table and the index backing the
//! most-recently-updated-first listing.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS trees (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    name       TEXT NOT NULL,
    data       TEXT NOT NULL,               -- JSON document, opaque to the store
    created_at TEXT NOT NULL,               -- RFC-3339 UTC, microseconds
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_trees_updated_at ON trees(updated_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
