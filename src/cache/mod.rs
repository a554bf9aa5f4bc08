//! Generic memoization cache shared by the calculation engine and the
//! offline calculator.
//!
//! This module provides:
//! - A string-keyed cache with LRU, TTL, adaptive and priority eviction
//! - A byte budget enforced by a size-to-utility heuristic
//! - Background expiry sweeps and compaction with explicit teardown
//! - Memoization of sync and async functions
//! - Snapshots through a small key/value storage port

mod entry;
mod maintenance;
mod memoize;
mod snapshot;
mod storage;
mod store;

pub use entry::{CacheEntry, CacheOptions, CacheStats, EvictionStrategy, SetOptions};
pub use maintenance::MaintenanceHandle;
pub use memoize::{serialized_key, Memoized};
pub use snapshot::CacheSnapshot;
pub use storage::{KeyValueStore, MemoryStore, NoopStore, SqliteStore};
pub use store::Cache;
