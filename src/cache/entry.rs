//! Cache entries, options and statistics.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Policy used to pick a victim when the cache is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
  /// Least recently accessed entry goes first
  #[default]
  Lru,
  /// Expired entries go first, then the one closest to expiry
  Ttl,
  /// Stale, rarely used, low priority entries go first
  Adaptive,
  /// Lowest priority entry goes first
  Persistent,
}

/// Static configuration of a cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheOptions {
  #[serde(default = "default_max_size")]
  pub max_size: usize,
  #[serde(default = "default_max_memory_bytes")]
  pub max_memory_bytes: usize,
  /// TTL applied when `set` is called without one. `None` never expires.
  #[serde(default = "default_ttl_ms")]
  pub default_ttl_ms: Option<u64>,
  #[serde(default)]
  pub strategy: EvictionStrategy,
  #[serde(default = "default_cleanup_interval_secs")]
  pub cleanup_interval_secs: u64,
  #[serde(default = "default_rebuild_interval_secs")]
  pub rebuild_interval_secs: u64,
}

impl Default for CacheOptions {
  fn default() -> Self {
    CacheOptions {
      max_size: default_max_size(),
      max_memory_bytes: default_max_memory_bytes(),
      default_ttl_ms: default_ttl_ms(),
      strategy: EvictionStrategy::default(),
      cleanup_interval_secs: default_cleanup_interval_secs(),
      rebuild_interval_secs: default_rebuild_interval_secs(),
    }
  }
}

impl CacheOptions {
  pub fn with_max_size(mut self, max_size: usize) -> Self {
    self.max_size = max_size;
    self
  }

  pub fn with_strategy(mut self, strategy: EvictionStrategy) -> Self {
    self.strategy = strategy;
    self
  }

  pub fn with_ttl_ms(mut self, ttl_ms: Option<u64>) -> Self {
    self.default_ttl_ms = ttl_ms;
    self
  }

  pub fn with_memory_budget(mut self, bytes: usize) -> Self {
    self.max_memory_bytes = bytes;
    self
  }
}

fn default_max_size() -> usize {
  1000
}
fn default_max_memory_bytes() -> usize {
  50 * 1024 * 1024
}
fn default_ttl_ms() -> Option<u64> {
  Some(60 * 60 * 1000)
}
fn default_cleanup_interval_secs() -> u64 {
  60
}
fn default_rebuild_interval_secs() -> u64 {
  60 * 60
}

/// Per-call overrides for `set`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SetOptions {
  pub ttl: Option<std::time::Duration>,
  pub priority: Option<f64>,
}

impl SetOptions {
  pub fn ttl(ttl: std::time::Duration) -> Self {
    Self {
      ttl: Some(ttl),
      priority: None,
    }
  }

  pub fn priority(priority: f64) -> Self {
    Self {
      ttl: None,
      priority: Some(priority),
    }
  }
}

/// A stored value plus access bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub key: String,
  pub value: T,
  pub access_count: u64,
  pub created_at: DateTime<Utc>,
  pub last_accessed: DateTime<Utc>,
  pub expires_at: Option<DateTime<Utc>>,
  /// Estimated serialized size in bytes
  pub size: usize,
  pub priority: f64,
  /// Monotonic access order, breaks timestamp ties
  #[serde(default)]
  pub(crate) touched: u64,
}

impl<T> CacheEntry<T> {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| now >= at)
  }

  pub(crate) fn touch(&mut self, now: DateTime<Utc>, tick: u64) {
    self.access_count += 1;
    self.last_accessed = now;
    self.touched = tick;
  }

  /// Seconds since last access, never below `f64::EPSILON`.
  pub(crate) fn idle_secs(&self, now: DateTime<Utc>) -> f64 {
    seconds(now - self.last_accessed).max(f64::EPSILON)
  }

  /// Accesses per second over the entry's lifetime.
  pub(crate) fn access_frequency(&self, now: DateTime<Utc>) -> f64 {
    let age = seconds(now - self.created_at).max(1e-3);
    self.access_count as f64 / age
  }

  /// Lower is more useful. Used under memory pressure.
  pub(crate) fn size_to_utility(&self, now: DateTime<Utc>) -> f64 {
    let utility = (self.access_count.max(1) as f64) / self.idle_secs(now);
    self.size as f64 / utility
  }

  /// Higher is less valuable. Used by the adaptive strategy.
  pub(crate) fn adaptive_score(&self, now: DateTime<Utc>) -> f64 {
    let frequency = self.access_frequency(now).max(f64::EPSILON);
    let priority = self.priority.max(f64::EPSILON);
    self.idle_secs(now) / frequency / priority
  }
}

fn seconds(d: Duration) -> f64 {
  d.num_microseconds()
    .map(|us| us as f64 / 1_000_000.0)
    .unwrap_or_else(|| d.num_milliseconds() as f64 / 1000.0)
    .max(0.0)
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
  pub hits: u64,
  pub misses: u64,
  pub evictions: u64,
  pub entries: usize,
  pub total_size: usize,
  /// Mean `get` latency in milliseconds over recent samples
  pub average_access_ms: f64,
  pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(access_count: u64, priority: f64, idle_ms: i64) -> CacheEntry<u8> {
    let now = Utc::now();
    CacheEntry {
      key: "k".into(),
      value: 0,
      access_count,
      created_at: now - Duration::seconds(10),
      last_accessed: now - Duration::milliseconds(idle_ms),
      expires_at: None,
      size: 100,
      priority,
      touched: 0,
    }
  }

  #[test]
  fn test_adaptive_score_prefers_busy_high_priority() {
    let now = Utc::now();
    let busy = entry(50, 2.0, 100);
    let idle = entry(1, 1.0, 5_000);
    assert!(idle.adaptive_score(now) > busy.adaptive_score(now));
  }

  #[test]
  fn test_expiry() {
    let now = Utc::now();
    let mut e = entry(0, 1.0, 0);
    assert!(!e.is_expired(now));
    e.expires_at = Some(now - Duration::milliseconds(1));
    assert!(e.is_expired(now));
  }

  #[test]
  fn test_options_parse_with_defaults() {
    let opts: CacheOptions = serde_yaml::from_str("strategy: adaptive\nmax_size: 10\n").unwrap();
    assert_eq!(opts.strategy, EvictionStrategy::Adaptive);
    assert_eq!(opts.max_size, 10);
    assert_eq!(opts.cleanup_interval_secs, 60);
  }
}
