//! Async access to the tree store.
//!
//! `arbor-store` is synchronous.  Each operation here runs on tokio's blocking
//! pool against its own short-lived connection, so requests never share a
//! connection and SQLite's file locking is the only coordination.

use std::path::PathBuf;
use std::sync::Arc;

use arbor_store::Database;

use crate::error::ServerError;

#[derive(Debug, Clone)]
pub struct TreeDb {
    path: Arc<PathBuf>,
}

impl TreeDb {
    /// Open the database once to create the file and apply migrations.
    pub fn open(path: PathBuf) -> Result<Self, ServerError> {
        Database::open_at(&path)?;
        Ok(Self {
            path: Arc::new(path),
        })
    }

    /// Run `op` against a fresh connection.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ServerError>
    where
        F: FnOnce(&Database) -> arbor_store::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let db = Database::connect(&path)?;
            op(&db)
        })
        .await
        .map_err(|e| ServerError::Internal(format!("Storage task failed: {e}")))?
        .map_err(ServerError::from)
    }
}
