// SPDX-License-Identifier: MPL-2.0

use crate::config::DB_FILE_NAME;
use crate::store::StoreError;
use crate::store::schema::SCHEMA;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Handle to the application database.
///
/// The only way to get one is [`Database::open`], which applies the schema
/// before returning, so every handle in circulation points at an initialized
/// database. Clones share the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Option<Connection>>>,
    path: PathBuf,
}

impl Database {
    /// Open or create the database inside `dir` and run migrations.
    /// Path: {dir}/data.db (data-dev.db for development builds)
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(DB_FILE_NAME);

        let conn = Connection::open(&path).map_err(|source| StoreError::Open {
            path: path.display().to_string(),
            source,
        })?;

        Self::migrate(&conn)?;

        tracing::debug!(path = %path.display(), "database ready");

        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            path,
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        // Execute the schema (all CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Close the connection. Returns `false` when it was already closed, so
    /// callers on several exit paths can all call this safely.
    pub fn close(&self) -> Result<bool, StoreError> {
        let mut guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(conn) = guard.take() else {
            return Ok(false);
        };

        conn.close().map_err(|(_, e)| StoreError::Database(e))?;
        tracing::debug!(path = %self.path.display(), "database closed");
        Ok(true)
    }

    /// Current unix timestamp in milliseconds
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema_objects(db: &Database) -> Vec<String> {
        db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT type || ':' || name FROM sqlite_master
                 WHERE name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(names)
        })
        .unwrap()
    }

    #[test]
    fn test_open_creates_file_and_schema() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path()).unwrap();

        assert!(db.path().exists());
        assert_eq!(db.path().file_name().unwrap(), DB_FILE_NAME);

        let objects = schema_objects(&db);
        assert!(objects.contains(&"table:domain".to_string()));
        assert!(objects.contains(&"table:history".to_string()));
        assert!(objects.contains(&"index:idx_history_domain".to_string()));
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();

        let first = Database::open(tmp.path()).unwrap();
        let before = schema_objects(&first);
        first.close().unwrap();

        let second = Database::open(tmp.path()).unwrap();
        assert_eq!(schema_objects(&second), before);

        let version: i64 = second
            .with_conn(|conn| Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_open_in_missing_directory_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");

        let err = Database::open(&missing).err().unwrap();
        assert!(matches!(err, StoreError::Open { .. }));
        assert!(!missing.exists());
    }

    #[test]
    fn test_close_happens_once() {
        let tmp = tempfile::tempdir().unwrap();
        let db = Database::open(tmp.path()).unwrap();
        let shared = db.clone();

        assert!(db.close().unwrap());
        assert!(!shared.close().unwrap());

        let err = shared.with_conn(|_| Ok(())).unwrap_err();
        assert!(matches!(err, StoreError::Closed));
    }
}
