//! CRUD operations for [`Tree`] records.
//!
//! Every operation is a single SQL statement, so each one is its own implicit
//! transaction.  Writes use `RETURNING` to hand back the stored row without a
//! second round trip, which also folds the existence check of update into the
//! write itself.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, ErrorCode};

use crate::database::Database;
use crate::document::{default_document, TreePatch};
use crate::error::{Result, StoreError};
use crate::models::{Tree, TreeSummary};

const TREE_COLUMNS: &str = "id, name, data, created_at, updated_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new tree holding the default document.
    ///
    /// Fails with [`StoreError::Conflict`] if `id` is already taken.
    pub fn create_tree(&self, id: &str, name: &str) -> Result<Tree> {
        let now = timestamp_now();
        let data = serde_json::to_string(&default_document())?;

        self.conn()
            .query_row(
                &format!(
                    "INSERT INTO trees (id, name, data, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)
                     RETURNING {TREE_COLUMNS}"
                ),
                params![id, name, data, now],
                row_to_tree,
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::Conflict(id.to_string())
                }
                other => StoreError::Sqlite(other),
            })
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single tree, document included.
    pub fn get_tree(&self, id: &str) -> Result<Tree> {
        self.conn()
            .query_row(
                &format!("SELECT {TREE_COLUMNS} FROM trees WHERE id = ?1"),
                params![id],
                row_to_tree,
            )
            .map_err(not_found)
    }

    /// List every tree as a summary, most recently updated first.
    pub fn list_tree_summaries(&self) -> Result<Vec<TreeSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, name, updated_at
             FROM trees
             ORDER BY updated_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map([], row_to_summary)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply a [`TreePatch`] and bump `updated_at`.
    ///
    /// Returns [`StoreError::NotFound`] if no such tree exists.  Concurrent
    /// writers race; the last statement to commit wins.
    pub fn update_tree(&self, id: &str, patch: &TreePatch) -> Result<Tree> {
        let data = patch.encoded_data()?;
        let now = timestamp_now();

        // MAX keeps updated_at non-decreasing if the wall clock steps back.
        self.conn()
            .query_row(
                &format!(
                    "UPDATE trees
                     SET name = COALESCE(?1, name),
                         data = COALESCE(?2, data),
                         updated_at = MAX(updated_at, ?3)
                     WHERE id = ?4
                     RETURNING {TREE_COLUMNS}"
                ),
                params![patch.name, data, now, id],
                row_to_tree,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a tree.  Returns `true` if a row was deleted; a missing id is
    /// not an error.
    pub fn delete_tree(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM trees WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Current time in the fixed-width form stored on disk, so that text order
/// matches chronological order.
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

/// Map a `rusqlite::Row` to a [`Tree`].
fn row_to_tree(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tree> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let data_str: String = row.get(2)?;
    let created_str: String = row.get(3)?;
    let updated_str: String = row.get(4)?;

    let data = serde_json::from_str(&data_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Tree {
        id,
        name,
        data,
        created_at: parse_timestamp(3, &created_str)?,
        updated_at: parse_timestamp(4, &updated_str)?,
    })
}

fn row_to_summary(row: &rusqlite::Row<'_>) -> rusqlite::Result<TreeSummary> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let updated_str: String = row.get(2)?;

    Ok(TreeSummary {
        id,
        name,
        updated_at: parse_timestamp(2, &updated_str)?,
    })
}
