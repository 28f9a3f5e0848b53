pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{EngineError, Result};

/// Shared SQLite handle backing both the mutation queue and the resource cache.
///
/// The connection is guarded by a blocking mutex; callers must never hold the
/// guard across an `.await`.
#[derive(Debug)]
pub struct Database {
  conn: Mutex<Connection>,
}

impl Database {
  /// Open or create the database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    Self::from_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let db = Self {
      conn: Mutex::new(conn),
    };
    db.run_migrations()?;
    Ok(db)
  }

  /// Default database path under the data directory.
  pub fn default_path(data_dir: &Path) -> PathBuf {
    data_dir.join("offline.db")
  }

  fn run_migrations(&self) -> Result<()> {
    self.conn()?.execute_batch(schema::SCHEMA)?;
    Ok(())
  }

  /// Lock the connection.
  pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| EngineError::LockPoisoned)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_migrations_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = Database::default_path(dir.path());

    Database::open(&path).unwrap();
    let db = Database::open(&path).unwrap();

    let tables: i64 = db
      .conn()
      .unwrap()
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
         AND name IN ('pending_todos', 'cache_namespaces', 'cache_entries')",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(tables, 3);
  }
}
