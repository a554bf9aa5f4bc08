//! In-memory key/value cache with pluggable eviction.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::debug;

use super::entry::{CacheEntry, CacheOptions, CacheStats, EvictionStrategy, SetOptions};
use super::maintenance::MaintenanceHandle;
use crate::error::Result;

/// Latency samples kept before trimming.
const MAX_ACCESS_SAMPLES: usize = 1000;
/// Samples retained after a trim.
const RETAINED_ACCESS_SAMPLES: usize = 500;

/// Mutable cache contents, shared with the maintenance task.
pub(crate) struct CacheState<T> {
  pub(crate) entries: HashMap<String, CacheEntry<T>>,
  pub(crate) hits: u64,
  pub(crate) misses: u64,
  pub(crate) evictions: u64,
  pub(crate) total_size: usize,
  access_times: Vec<f64>,
  tick: u64,
}

impl<T> CacheState<T> {
  fn new() -> Self {
    Self {
      entries: HashMap::new(),
      hits: 0,
      misses: 0,
      evictions: 0,
      total_size: 0,
      access_times: Vec::new(),
      tick: 0,
    }
  }

  fn next_tick(&mut self) -> u64 {
    self.tick += 1;
    self.tick
  }

  fn record_access(&mut self, elapsed_ms: f64) {
    self.access_times.push(elapsed_ms);
    if self.access_times.len() > MAX_ACCESS_SAMPLES {
      let excess = self.access_times.len() - RETAINED_ACCESS_SAMPLES;
      self.access_times.drain(..excess);
    }
  }

  fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
    let entry = self.entries.remove(key)?;
    self.total_size = self.total_size.saturating_sub(entry.size);
    Some(entry)
  }

  fn evict(&mut self, key: &str, reason: &'static str) {
    if self.remove(key).is_some() {
      self.evictions += 1;
      debug!(key, reason, "cache eviction");
    }
  }

  /// Insert an entry restored from a snapshot, keeping access order intact.
  pub(crate) fn restore(&mut self, entry: CacheEntry<T>) {
    self.tick = self.tick.max(entry.touched);
    self.total_size += entry.size;
    self.entries.insert(entry.key.clone(), entry);
  }

  /// Drop every expired entry. Returns how many were removed.
  pub(crate) fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
    let expired: Vec<String> = self
      .entries
      .values()
      .filter(|e| e.is_expired(now))
      .map(|e| e.key.clone())
      .collect();
    for key in &expired {
      self.remove(key);
    }
    expired.len()
  }

  /// Release spare map capacity and recount the byte total.
  pub(crate) fn compact(&mut self) {
    self.entries.shrink_to_fit();
    self.total_size = self.entries.values().map(|e| e.size).sum();
    self.access_times.shrink_to_fit();
  }

  /// Evict by worst size-to-utility until `incoming` bytes fit in `budget`.
  fn relieve_memory_pressure(&mut self, incoming: usize, budget: usize, now: DateTime<Utc>) {
    while self.total_size + incoming > budget {
      let victim = self
        .entries
        .values()
        .max_by(|a, b| a.size_to_utility(now).total_cmp(&b.size_to_utility(now)))
        .map(|e| e.key.clone());
      match victim {
        Some(key) => self.evict(&key, "memory"),
        None => break,
      }
    }
  }

  /// Evict one entry (or, under `ttl`, every expired entry) to free a slot.
  fn evict_for_slot(&mut self, strategy: EvictionStrategy, now: DateTime<Utc>) {
    let victim = match strategy {
      EvictionStrategy::Lru => self.least_recent(),
      EvictionStrategy::Ttl => {
        let expired: Vec<String> = self
          .entries
          .values()
          .filter(|e| e.is_expired(now))
          .map(|e| e.key.clone())
          .collect();
        if !expired.is_empty() {
          for key in &expired {
            self.evict(key, "expired");
          }
          return;
        }
        self
          .entries
          .values()
          .min_by(|a, b| match (a.expires_at, b.expires_at) {
            (Some(x), Some(y)) => x.cmp(&y).then(a.touched.cmp(&b.touched)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.touched.cmp(&b.touched),
          })
          .map(|e| e.key.clone())
      }
      EvictionStrategy::Adaptive => self
        .entries
        .values()
        .max_by(|a, b| a.adaptive_score(now).total_cmp(&b.adaptive_score(now)))
        .map(|e| e.key.clone()),
      EvictionStrategy::Persistent => self
        .entries
        .values()
        .min_by(|a, b| {
          a.priority
            .total_cmp(&b.priority)
            .then(a.touched.cmp(&b.touched))
        })
        .map(|e| e.key.clone()),
    };

    if let Some(key) = victim {
      self.evict(&key, "capacity");
    }
  }

  fn least_recent(&self) -> Option<String> {
    self
      .entries
      .values()
      .min_by_key(|e| e.touched)
      .map(|e| e.key.clone())
  }

  fn stats(&self) -> CacheStats {
    let lookups = self.hits + self.misses;
    let average_access_ms = if self.access_times.is_empty() {
      0.0
    } else {
      self.access_times.iter().sum::<f64>() / self.access_times.len() as f64
    };
    CacheStats {
      hits: self.hits,
      misses: self.misses,
      evictions: self.evictions,
      entries: self.entries.len(),
      total_size: self.total_size,
      average_access_ms,
      hit_rate: if lookups == 0 {
        0.0
      } else {
        self.hits as f64 / lookups as f64
      },
    }
  }
}

/// Generic string-keyed cache.
///
/// All operations take `&self`; contents live behind a mutex that is never
/// held across an await point. Two callers racing on the same key may both
/// miss and both `set`, the later write wins.
pub struct Cache<T> {
  options: CacheOptions,
  pub(crate) state: Arc<Mutex<CacheState<T>>>,
  pub(crate) maintenance: Mutex<Option<MaintenanceHandle>>,
}

impl<T> Cache<T> {
  pub fn new(options: CacheOptions) -> Self {
    Self {
      options,
      state: Arc::new(Mutex::new(CacheState::new())),
      maintenance: Mutex::new(None),
    }
  }

  pub fn options(&self) -> &CacheOptions {
    &self.options
  }

  pub(crate) fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Remove a key. Returns whether it was present.
  pub fn delete(&self, key: &str) -> bool {
    self.lock().remove(key).is_some()
  }

  pub fn delete_multiple<K: AsRef<str>>(&self, keys: &[K]) -> usize {
    let mut state = self.lock();
    keys
      .iter()
      .filter(|k| state.remove(k.as_ref()).is_some())
      .count()
  }

  /// Drop all entries. Counters are kept.
  pub fn clear(&self) {
    let mut state = self.lock();
    state.entries.clear();
    state.total_size = 0;
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains(&self, key: &str) -> bool {
    let now = Utc::now();
    self
      .lock()
      .entries
      .get(key)
      .is_some_and(|e| !e.is_expired(now))
  }

  pub fn purge_expired(&self) -> usize {
    self.lock().purge_expired(Utc::now())
  }

  pub fn stats(&self) -> CacheStats {
    self.lock().stats()
  }
}

impl<T: Clone> Cache<T> {
  /// Look up a key, updating access bookkeeping.
  ///
  /// An expired entry is removed and reported as a miss.
  pub fn get(&self, key: &str) -> Option<T> {
    let started = Instant::now();
    let now = Utc::now();
    let mut state = self.lock();

    let expired = state.entries.get(key).map(|e| e.is_expired(now));
    let value = match expired {
      None => {
        state.misses += 1;
        None
      }
      Some(true) => {
        state.remove(key);
        state.misses += 1;
        debug!(key, "cache entry expired");
        None
      }
      Some(false) => {
        let tick = state.next_tick();
        state.hits += 1;
        state.entries.get_mut(key).map(|entry| {
          entry.touch(now, tick);
          entry.value.clone()
        })
      }
    };

    state.record_access(started.elapsed().as_secs_f64() * 1000.0);
    value
  }

  pub fn get_multiple<K: AsRef<str>>(&self, keys: &[K]) -> HashMap<String, T> {
    keys
      .iter()
      .filter_map(|k| self.get(k.as_ref()).map(|v| (k.as_ref().to_string(), v)))
      .collect()
  }

  /// Clone out every live entry, for snapshots.
  pub fn entries(&self) -> Vec<CacheEntry<T>> {
    let now = Utc::now();
    let mut entries: Vec<CacheEntry<T>> = self
      .lock()
      .entries
      .values()
      .filter(|e| !e.is_expired(now))
      .cloned()
      .collect();
    entries.sort_by_key(|e| e.touched);
    entries
  }
}

impl<T: Serialize> Cache<T> {
  /// Insert or replace a value.
  ///
  /// Capacity is managed before the insert: memory pressure first, then the
  /// entry-count limit via the configured strategy. A value larger than the
  /// whole memory budget is not stored.
  pub fn set(&self, key: impl Into<String>, value: T, opts: SetOptions) -> Result<()> {
    let key = key.into();
    let size = serde_json::to_vec(&value)?.len();
    let now = Utc::now();

    if size > self.options.max_memory_bytes || self.options.max_size == 0 {
      debug!(key = %key, size, "value does not fit in cache budget");
      return Ok(());
    }

    let ttl = opts
      .ttl
      .or_else(|| self.options.default_ttl_ms.map(std::time::Duration::from_millis));
    let expires_at = ttl
      .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
      .map(|ttl| now + ttl);

    let mut state = self.lock();
    state.remove(&key);

    if state.total_size + size > self.options.max_memory_bytes {
      state.relieve_memory_pressure(size, self.options.max_memory_bytes, now);
    }
    if state.entries.len() >= self.options.max_size {
      state.evict_for_slot(self.options.strategy, now);
    }

    let tick = state.next_tick();
    state.total_size += size;
    state.entries.insert(
      key.clone(),
      CacheEntry {
        key,
        value,
        access_count: 0,
        created_at: now,
        last_accessed: now,
        expires_at,
        size,
        priority: opts.priority.unwrap_or(1.0),
        touched: tick,
      },
    );
    Ok(())
  }

  pub fn set_multiple<I>(&self, items: I, opts: SetOptions) -> Result<()>
  where
    I: IntoIterator<Item = (String, T)>,
  {
    for (key, value) in items {
      self.set(key, value, opts)?;
    }
    Ok(())
  }
}

impl<T> Drop for Cache<T> {
  fn drop(&mut self) {
    if let Some(handle) = self
      .maintenance
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .take()
    {
      handle.abort();
    }
  }
}
