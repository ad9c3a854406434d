//! SQLite storage for the daemon.
//!
//! A single connection is shared behind an async mutex. Holding the guard
//! serializes every read-modify-write sequence in the process, and write
//! transactions are opened `IMMEDIATE` so another process sharing the file
//! cannot interleave with them either.

mod schema;

use crate::utils::SCHEMA_VERSION;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    #[error("Database schema version {found} is newer than supported version {supported}")]
    UnsupportedSchema { found: i32, supported: i32 },
}

/// Handle to the shared connection. Cloning is cheap.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at a specific path
    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened database");
        Self::from_connection(conn)
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Acquire the connection. Keep the guard only for synchronous work:
    /// statements and transactions must not be held across an `.await`.
    pub async fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    let existing_version: i32 =
        conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if existing_version > SCHEMA_VERSION {
        return Err(DatabaseError::UnsupportedSchema {
            found: existing_version,
            supported: SCHEMA_VERSION,
        });
    }

    if existing_version < SCHEMA_VERSION {
        debug!(from = existing_version, to = SCHEMA_VERSION, "Creating schema");
        conn.execute_batch(schema::CREATE_SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }

    Ok(())
}

/// Map "no rows" to `None` for single-row lookups.
pub(crate) fn optional<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether an error is a UNIQUE / PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_in_memory_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.lock().await;
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let fk: i32 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_open_at_reopens_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("wayfarer.sqlite");

        {
            let db = Database::open_at(&path).unwrap();
            let conn = db.lock().await;
            conn.execute(
                "INSERT INTO locations (id, name, latitude, longitude, location_type, created_at)
                 VALUES ('loc', 'Harbour', 1.0, 2.0, 'poi', 'now')",
                [],
            )
            .unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        let conn = db.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let err = init_schema(&conn).unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedSchema { .. }));
    }
}
