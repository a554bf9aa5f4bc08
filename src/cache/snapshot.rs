//! Export and import of a cache instance as one JSON document.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use super::entry::{CacheEntry, CacheOptions, CacheStats};
use super::storage::KeyValueStore;
use super::store::Cache;
use crate::error::{Error, Result};

/// Persisted form of a cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot<T> {
  pub options: CacheOptions,
  pub stats: CacheStats,
  pub entries: HashMap<String, CacheEntry<T>>,
}

impl<T: Clone> Cache<T> {
  pub fn export(&self) -> CacheSnapshot<T> {
    CacheSnapshot {
      options: self.options().clone(),
      stats: self.stats(),
      entries: self
        .entries()
        .into_iter()
        .map(|e| (e.key.clone(), e))
        .collect(),
    }
  }

  /// Replace the contents with a snapshot's entries.
  ///
  /// The snapshot is checked as a whole first; nothing is loaded if any entry
  /// is inconsistent. Expired entries are dropped and the entry-count limit
  /// keeps the most recently used ones.
  pub fn import(&self, snapshot: CacheSnapshot<T>) -> Result<usize> {
    for (key, entry) in &snapshot.entries {
      if key != &entry.key {
        return Err(Error::ImportFormat(format!(
          "entry stored under {} claims key {}",
          key, entry.key
        )));
      }
      if !entry.priority.is_finite() {
        return Err(Error::ImportFormat(format!(
          "entry {} has a non-finite priority",
          key
        )));
      }
    }

    let now = chrono::Utc::now();
    let mut live: Vec<CacheEntry<T>> = snapshot
      .entries
      .into_values()
      .filter(|e| !e.is_expired(now))
      .collect();
    live.sort_by_key(|e| std::cmp::Reverse(e.touched));
    live.truncate(self.options().max_size);

    let mut state = self.lock();
    state.entries.clear();
    state.total_size = 0;
    let mut loaded = 0;
    for entry in live.into_iter().rev() {
      if state.total_size + entry.size > self.options().max_memory_bytes {
        continue;
      }
      state.restore(entry);
      loaded += 1;
    }
    Ok(loaded)
  }
}

impl<T: Clone + Serialize + DeserializeOwned> Cache<T> {
  /// Write the cache to `store` under `key`.
  pub async fn save_to(&self, store: &dyn KeyValueStore, key: &str) -> Result<()> {
    let document = serde_json::to_string(&self.export())?;
    store.set(key, document).await?;
    info!(key, entries = self.len(), "cache snapshot saved");
    Ok(())
  }

  /// Load the snapshot stored under `key`. Returns `false` when none exists.
  pub async fn load_from(&self, store: &dyn KeyValueStore, key: &str) -> Result<bool> {
    let Some(document) = store.get(key).await? else {
      return Ok(false);
    };
    let snapshot: CacheSnapshot<T> =
      serde_json::from_str(&document).map_err(|e| Error::ImportFormat(e.to_string()))?;
    let loaded = self.import(snapshot)?;
    info!(key, loaded, "cache snapshot loaded");
    Ok(true)
  }
}
