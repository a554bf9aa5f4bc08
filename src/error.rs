//! Error types for calculation, caching and offline operations.

use thiserror::Error;

/// Errors raised by storage port backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
  #[error("storage backend failure: {0}")]
  Backend(String),

  #[error("storage lock poisoned")]
  LockPoisoned,
}

/// Errors surfaced by the calculation core.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
  /// Malformed or oversized input. Raised before any cache lookup or phase runs.
  #[error("invalid input: {0}")]
  Validation(String),

  /// Requested relics are not present in the local replica.
  #[error("relics missing from offline data: {}", ids.join(", "))]
  MissingOfflineData { ids: Vec<String> },

  /// Unexpected failure inside a pipeline phase.
  #[error("calculation failed during {phase} phase: {reason}")]
  CalculationFailure { phase: &'static str, reason: String },

  /// Remote catalog fetch failed. Only ever logged by `sync`.
  #[error("sync failed: {0}")]
  Sync(String),

  /// A persisted snapshot could not be read back.
  #[error("malformed snapshot: {0}")]
  ImportFormat(String),

  #[error("serialization error: {0}")]
  Serialization(String),

  #[error(transparent)]
  Storage(#[from] StorageError),
}

impl Error {
  pub(crate) fn phase(phase: &'static str, reason: impl Into<String>) -> Self {
    Error::CalculationFailure {
      phase,
      reason: reason.into(),
    }
  }
}

impl From<serde_json::Error> for Error {
  fn from(e: serde_json::Error) -> Self {
    Error::Serialization(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_data_lists_ids() {
    let err = Error::MissingOfflineData {
      ids: vec!["a".into(), "b".into()],
    };
    assert_eq!(err.to_string(), "relics missing from offline data: a, b");
  }

  #[test]
  fn test_storage_error_is_transparent() {
    let err: Error = StorageError::LockPoisoned.into();
    assert_eq!(err.to_string(), "storage lock poisoned");
  }
}
