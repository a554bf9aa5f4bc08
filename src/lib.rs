//! Relic attack-multiplier calculation.
//!
//! - [`engine`]: the phase pipeline behind [`engine::CalculationEngine::calculate`]
//! - [`cache`]: generic memoization cache with pluggable eviction and snapshots
//! - [`offline`]: tiered degradation over a local catalog replica
//! - [`source`]: authoritative catalog sources used by offline sync

pub mod cache;
pub mod engine;
pub mod error;
pub mod offline;
pub mod relic;
pub mod source;

pub use error::{Error, Result, StorageError};
