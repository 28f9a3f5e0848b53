//! Durable store of todos inserted while offline.

use rusqlite::params;
use std::sync::Arc;
use tracing::debug;

use crate::db::Database;
use crate::error::Result;
use crate::todo::Todo;

/// Pending inserts, keyed by todo id.
///
/// Only the interceptor writes here and only the sync coordinator clears it.
#[derive(Clone)]
pub struct MutationQueue {
  db: Arc<Database>,
}

impl MutationQueue {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Every pending todo, ordered by id.
  pub async fn list_all(&self) -> Result<Vec<Todo>> {
    let conn = self.db.conn()?;
    let mut stmt = conn.prepare("SELECT data FROM pending_todos ORDER BY id")?;

    let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

    let mut todos = Vec::new();
    for data in rows {
      todos.push(serde_json::from_slice(&data?)?);
    }
    Ok(todos)
  }

  /// Store a todo, replacing any pending entry with the same id.
  pub async fn put(&self, todo: &Todo) -> Result<()> {
    let data = serde_json::to_vec(todo)?;
    self.db.conn()?.execute(
      "INSERT OR REPLACE INTO pending_todos (id, data, queued_at) VALUES (?, ?, datetime('now'))",
      params![todo.id, data],
    )?;
    debug!(id = todo.id, "queued todo for sync");
    Ok(())
  }

  /// Remove every pending entry in one transaction.
  pub async fn clear(&self) -> Result<()> {
    let mut conn = self.db.conn()?;
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM pending_todos", [])?;
    tx.commit()?;
    debug!(removed, "cleared sync queue");
    Ok(())
  }

  pub async fn len(&self) -> Result<usize> {
    let count: i64 = self
      .db
      .conn()?
      .query_row("SELECT COUNT(*) FROM pending_todos", [], |row| row.get(0))?;
    Ok(count as usize)
  }

  pub async fn is_empty(&self) -> Result<bool> {
    Ok(self.len().await? == 0)
  }
}
