//! Versioned response cache on SQLite.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use rusqlite::{params, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::remote::{ApiRequest, ApiResponse, Transport};

/// A stored response and when it was stored.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: ApiResponse,
  pub stored_at: DateTime<Utc>,
}

/// All cache namespaces in the database.
#[derive(Clone)]
pub struct ResourceCache {
  db: Arc<Database>,
}

impl ResourceCache {
  pub fn new(db: Arc<Database>) -> Self {
    Self { db }
  }

  /// Open a namespace, creating it empty if it does not exist.
  pub async fn open(&self, name: &str) -> Result<CacheNamespace> {
    self.db.conn()?.execute(
      "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
      params![name],
    )?;

    Ok(CacheNamespace {
      db: Arc::clone(&self.db),
      name: name.to_string(),
    })
  }

  /// Whether `name` holds a complete copy of the static manifest.
  pub async fn is_seeded(&self, name: &str) -> Result<bool> {
    let seeded: Option<bool> = self
      .db
      .conn()?
      .query_row(
        "SELECT seeded FROM cache_namespaces WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()?;
    Ok(seeded.unwrap_or(false))
  }

  /// Seed `name` with every path in `manifest`, fetched through `transport`.
  ///
  /// All paths are fetched before anything is written. If any fetch fails or
  /// answers with a non-success status, nothing is stored and the namespace
  /// stays unseeded, so the next install starts from scratch. An already
  /// seeded namespace is returned untouched.
  pub async fn install(
    &self,
    name: &str,
    manifest: &[String],
    transport: &dyn Transport,
  ) -> Result<CacheNamespace> {
    if self.is_seeded(name).await? {
      debug!(namespace = name, "cache namespace already seeded");
      return self.open(name).await;
    }

    info!(namespace = name, assets = manifest.len(), "seeding cache namespace");

    let requests: Vec<ApiRequest> = manifest.iter().map(|path| ApiRequest::get(path.as_str())).collect();
    let responses = join_all(requests.iter().map(|r| transport.send(r))).await;

    let mut fetched = Vec::with_capacity(requests.len());
    for (request, response) in requests.iter().zip(responses) {
      let response = response.map_err(|e| EngineError::Bootstrap {
        key: request.path.clone(),
        reason: e.to_string(),
      })?;
      if !response.is_success() {
        return Err(EngineError::Bootstrap {
          key: request.path.clone(),
          reason: format!("{} {}", response.status, response.status_text),
        });
      }
      fetched.push((request, response));
    }

    {
      let mut conn = self.db.conn()?;
      let tx = conn.transaction()?;
      tx.execute(
        "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
        params![name],
      )?;
      for (request, response) in &fetched {
        insert_entry(&tx, name, request, response)?;
      }
      tx.execute(
        "UPDATE cache_namespaces SET seeded = 1 WHERE name = ?",
        params![name],
      )?;
      tx.commit()?;
    }

    info!(namespace = name, "cache namespace seeded");
    self.open(name).await
  }

  /// Delete every namespace except `keep`. Returns the names deleted.
  pub async fn delete_except(&self, keep: &str) -> Result<Vec<String>> {
    let mut conn = self.db.conn()?;
    let tx = conn.transaction()?;

    let stale: Vec<String> = {
      let mut stmt = tx.prepare("SELECT name FROM cache_namespaces WHERE name != ? ORDER BY name")?;
      let rows = stmt.query_map(params![keep], |row| row.get(0))?;
      rows.collect::<rusqlite::Result<_>>()?
    };

    tx.execute("DELETE FROM cache_entries WHERE namespace != ?", params![keep])?;
    tx.execute("DELETE FROM cache_namespaces WHERE name != ?", params![keep])?;
    tx.commit()?;

    for name in &stale {
      info!(namespace = name.as_str(), "deleted stale cache namespace");
    }
    Ok(stale)
  }

  pub async fn names(&self) -> Result<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn.prepare("SELECT name FROM cache_namespaces ORDER BY name")?;
    let rows = stmt.query_map([], |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<_>>()?)
  }
}

/// Handle to one namespace.
#[derive(Debug, Clone)]
pub struct CacheNamespace {
  db: Arc<Database>,
  name: String,
}

impl CacheNamespace {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Store `response` as the answer to `request`, superseding any earlier one.
  pub async fn put(&self, request: &ApiRequest, response: &ApiResponse) -> Result<()> {
    let conn = self.db.conn()?;
    insert_entry(&conn, &self.name, request, response)?;
    debug!(namespace = self.name.as_str(), request = %request.request_line(), "cached response");
    Ok(())
  }

  /// Exact-match lookup of `request`.
  pub async fn lookup(&self, request: &ApiRequest) -> Result<Option<CachedResponse>> {
    let conn = self.db.conn()?;

    let row: Option<(u16, String, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, status_text, headers, body, stored_at FROM cache_entries
         WHERE namespace = ? AND request_key = ?",
        params![self.name, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
      )
      .optional()?;

    match row {
      Some((status, status_text, headers, body, stored_at)) => {
        let headers: BTreeMap<String, String> = serde_json::from_str(&headers)?;
        Ok(Some(CachedResponse {
          response: ApiResponse {
            status,
            status_text,
            headers,
            body,
          },
          stored_at: parse_datetime(&stored_at)?,
        }))
      }
      None => Ok(None),
    }
  }

  /// Lookup that treats absence as `CacheMiss`.
  pub async fn require(&self, request: &ApiRequest) -> Result<CachedResponse> {
    self
      .lookup(request)
      .await?
      .ok_or_else(|| EngineError::CacheMiss {
        key: request.request_line(),
      })
  }

  pub async fn len(&self) -> Result<usize> {
    let count: i64 = self.db.conn()?.query_row(
      "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?",
      params![self.name],
      |row| row.get(0),
    )?;
    Ok(count as usize)
  }
}

fn insert_entry(
  conn: &rusqlite::Connection,
  namespace: &str,
  request: &ApiRequest,
  response: &ApiResponse,
) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)?;
  conn.execute(
    "INSERT OR REPLACE INTO cache_entries
       (namespace, request_key, request_line, status, status_text, headers, body, stored_at)
     VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))",
    params![
      namespace,
      request.cache_key(),
      request.request_line(),
      response.status,
      response.status_text,
      headers,
      response.body,
    ],
  )?;
  Ok(())
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(EngineError::from)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::testing::FakeRemote;

  fn cache() -> ResourceCache {
    ResourceCache::new(Arc::new(Database::open_in_memory().unwrap()))
  }

  fn manifest() -> Vec<String> {
    vec!["/".to_string(), "/assets/index.css".to_string(), "/src/app.js".to_string()]
  }

  fn shell() -> FakeRemote {
    FakeRemote::new()
      .with_asset("/", "<html></html>")
      .with_asset("/assets/index.css", "body {}")
      .with_asset("/src/app.js", "main()")
  }

  #[tokio::test]
  async fn test_put_then_lookup() {
    let ns = cache().open("todo-v1").await.unwrap();
    let request = ApiRequest::get("/todos");
    let response = ApiResponse::new(200, "OK", b"{\"items\":[]}".to_vec()).with_header("date", "x");

    assert!(ns.lookup(&request).await.unwrap().is_none());
    let before = Utc::now();
    ns.put(&request, &response).await.unwrap();

    let cached = ns.lookup(&request).await.unwrap().unwrap();
    assert_eq!(cached.response, response);
    assert!(cached.stored_at >= before - chrono::Duration::seconds(1));
    assert_eq!(ns.name(), "todo-v1");
  }

  #[tokio::test]
  async fn test_put_supersedes_previous_entry() {
    let ns = cache().open("todo-v1").await.unwrap();
    let request = ApiRequest::get("/todos");

    ns.put(&request, &ApiResponse::new(200, "OK", b"old".to_vec())).await.unwrap();
    ns.put(&request, &ApiResponse::new(200, "OK", b"new".to_vec())).await.unwrap();

    assert_eq!(ns.len().await.unwrap(), 1);
    assert_eq!(ns.require(&request).await.unwrap().response.body, b"new".to_vec());
  }

  #[tokio::test]
  async fn test_namespaces_are_isolated() {
    let cache = cache();
    let v1 = cache.open("todo-v1").await.unwrap();
    let v2 = cache.open("todo-v2").await.unwrap();
    let request = ApiRequest::get("/todos");

    v1.put(&request, &ApiResponse::new(200, "OK", Vec::new())).await.unwrap();

    assert!(v2.lookup(&request).await.unwrap().is_none());
    assert!(matches!(
      v2.require(&request).await,
      Err(EngineError::CacheMiss { .. })
    ));
  }

  #[tokio::test]
  async fn test_install_seeds_every_manifest_entry() {
    let cache = cache();
    let remote = shell();

    let ns = cache.install("todo-v3", &manifest(), &remote).await.unwrap();

    assert!(cache.is_seeded("todo-v3").await.unwrap());
    assert_eq!(ns.len().await.unwrap(), 3);
    let css = ns.require(&ApiRequest::get("/assets/index.css")).await.unwrap();
    assert_eq!(css.response.body, b"body {}".to_vec());
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let cache = cache();
    // "/src/app.js" is missing, so the remote answers 404 for it
    let remote = FakeRemote::new()
      .with_asset("/", "<html></html>")
      .with_asset("/assets/index.css", "body {}");

    let err = cache.install("todo-v3", &manifest(), &remote).await.unwrap_err();
    assert!(matches!(err, EngineError::Bootstrap { ref key, .. } if key == "/src/app.js"));

    assert!(!cache.is_seeded("todo-v3").await.unwrap());
    let ns = cache.open("todo-v3").await.unwrap();
    assert_eq!(ns.len().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn test_install_fails_whole_when_offline() {
    let cache = cache();
    let remote = shell();
    remote.set_online(false);

    assert!(cache.install("todo-v3", &manifest(), &remote).await.is_err());
    assert!(!cache.is_seeded("todo-v3").await.unwrap());

    // Retried from scratch once the network is back
    remote.set_online(true);
    let ns = cache.install("todo-v3", &manifest(), &remote).await.unwrap();
    assert_eq!(ns.len().await.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_install_skips_seeded_namespace() {
    let cache = cache();
    let remote = shell();

    cache.install("todo-v3", &manifest(), &remote).await.unwrap();
    let calls = remote.calls();
    cache.install("todo-v3", &manifest(), &remote).await.unwrap();

    assert_eq!(remote.calls(), calls);
  }

  #[tokio::test]
  async fn test_delete_except_drops_stale_generations() {
    let cache = cache();
    let request = ApiRequest::get("/todos");
    let old = cache.open("todo-v2").await.unwrap();
    old.put(&request, &ApiResponse::new(200, "OK", Vec::new())).await.unwrap();
    cache.open("todo-v3").await.unwrap();

    let deleted = cache.delete_except("todo-v3").await.unwrap();

    assert_eq!(deleted, vec!["todo-v2".to_string()]);
    assert_eq!(cache.names().await.unwrap(), vec!["todo-v3".to_string()]);
    assert_eq!(old.len().await.unwrap(), 0);
  }
}
