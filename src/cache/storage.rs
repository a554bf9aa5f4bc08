//! Storage port for snapshots, with memory and SQLite backends.

use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::StorageError;

type StorageResult<T> = std::result::Result<T, StorageError>;

/// Small fallible key/value port used for best-effort local durability.
pub trait KeyValueStore: Send + Sync {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Option<String>>>;

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, StorageResult<()>>;

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>>;
}

/// Store that keeps nothing.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStore;

impl KeyValueStore for NoopStore {
  fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StorageResult<Option<String>>> {
    Box::pin(async { Ok(None) }) // Always miss
  }

  fn set<'a>(&'a self, _key: &'a str, _value: String) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async { Ok(()) }) // Discard
  }

  fn remove<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async { Ok(()) })
  }
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
  data: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl KeyValueStore for MemoryStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Option<String>>> {
    Box::pin(async move {
      let data = self.data.lock().map_err(|_| StorageError::LockPoisoned)?;
      Ok(data.get(key).cloned())
    })
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async move {
      let mut data = self.data.lock().map_err(|_| StorageError::LockPoisoned)?;
      data.insert(key.to_string(), value);
      Ok(())
    })
  }

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async move {
      let mut data = self.data.lock().map_err(|_| StorageError::LockPoisoned)?;
      data.remove(key);
      Ok(())
    })
  }
}

/// SQLite-backed store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

/// Schema for the key/value table.
const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> StorageResult<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) a store at `path`.
  pub fn open_at(path: &Path) -> StorageResult<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| {
        StorageError::Backend(format!("Failed to create store directory: {}", e))
      })?;
    }

    let conn = Connection::open(path).map_err(|e| {
      StorageError::Backend(format!(
        "Failed to open store at {}: {}",
        path.display(),
        e
      ))
    })?;

    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> StorageResult<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| StorageError::Backend(format!("Failed to open in-memory store: {}", e)))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> StorageResult<Self> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| StorageError::Backend(format!("Failed to run store migrations: {}", e)))?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Get the default database path.
  pub fn default_path() -> StorageResult<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| StorageError::Backend("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("relicalc").join("store.db"))
  }

  fn with_conn<R>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<R>) -> StorageResult<R> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
    f(&conn).map_err(|e| StorageError::Backend(e.to_string()))
  }
}

impl KeyValueStore for SqliteStore {
  fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<Option<String>>> {
    Box::pin(async move {
      self.with_conn(|conn| {
        conn
          .query_row(
            "SELECT value FROM kv_store WHERE key = ?",
            params![key],
            |row| row.get(0),
          )
          .optional()
      })
    })
  }

  fn set<'a>(&'a self, key: &'a str, value: String) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async move {
      self.with_conn(|conn| {
        conn
          .execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?, ?, datetime('now'))",
            params![key, value],
          )
          .map(|_| ())
      })
    })
  }

  fn remove<'a>(&'a self, key: &'a str) -> BoxFuture<'a, StorageResult<()>> {
    Box::pin(async move {
      self.with_conn(|conn| {
        conn
          .execute("DELETE FROM kv_store WHERE key = ?", params![key])
          .map(|_| ())
      })
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  async fn round_trip(store: &dyn KeyValueStore) {
    assert_eq!(store.get("k").await.unwrap(), None);
    store.set("k", "v1".to_string()).await.unwrap();
    store.set("k", "v2".to_string()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), Some("v2".to_string()));
    store.remove("k").await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_memory_store() {
    round_trip(&MemoryStore::new()).await;
  }

  #[tokio::test]
  async fn test_sqlite_store() {
    round_trip(&SqliteStore::open_in_memory().unwrap()).await;
  }

  #[tokio::test]
  async fn test_noop_store_discards() {
    let store = NoopStore;
    store.set("k", "v".to_string()).await.unwrap();
    assert_eq!(store.get("k").await.unwrap(), None);
  }
}
