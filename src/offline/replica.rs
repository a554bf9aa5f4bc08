//! Local copy of the relic catalog and its persisted form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::engine::CalculationResult;
use crate::error::{Error, Result};
use crate::relic::Relic;

/// In-memory catalog replica keyed by relic id.
#[derive(Debug, Default)]
pub(crate) struct Replica {
  pub relics: HashMap<String, Relic>,
  pub last_sync: Option<DateTime<Utc>>,
  /// Bumped on every successful sync or restore
  pub version: u64,
}

impl Replica {
  pub fn replace(&mut self, relics: Vec<Relic>, synced_at: DateTime<Utc>) {
    self.relics = relics.into_iter().map(|r| (r.id.clone(), r)).collect();
    self.last_sync = Some(synced_at);
    self.version += 1;
  }

  /// Look up every id, collecting the ones the replica lacks.
  pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Relic>> {
    let mut found = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();
    for id in ids {
      match self.relics.get(id.as_ref()) {
        Some(relic) => found.push(relic.clone()),
        None => missing.push(id.as_ref().to_string()),
      }
    }
    if missing.is_empty() {
      Ok(found)
    } else {
      Err(Error::MissingOfflineData { ids: missing })
    }
  }

  /// Catalog sorted by id.
  pub fn sorted(&self) -> Vec<Relic> {
    let mut relics: Vec<Relic> = self.relics.values().cloned().collect();
    relics.sort_by(|a, b| a.id.cmp(&b.id));
    relics
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaMetadata {
  pub last_sync: Option<DateTime<Utc>>,
  pub version: u64,
  pub relic_count: usize,
  pub calculation_count: u64,
}

/// Persisted replica: catalog, cached offline results and sync metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaDocument {
  pub relics: Vec<Relic>,
  pub calculations: Vec<(String, CalculationResult)>,
  pub metadata: ReplicaMetadata,
}

impl ReplicaDocument {
  pub fn parse(document: &str) -> Result<Self> {
    let parsed: ReplicaDocument =
      serde_json::from_str(document).map_err(|e| Error::ImportFormat(e.to_string()))?;
    parsed.check()?;
    Ok(parsed)
  }

  fn check(&self) -> Result<()> {
    if self.metadata.relic_count != self.relics.len() {
      return Err(Error::ImportFormat(format!(
        "metadata lists {} relics but document holds {}",
        self.metadata.relic_count,
        self.relics.len()
      )));
    }
    for relic in &self.relics {
      relic
        .validate()
        .map_err(|e| Error::ImportFormat(format!("invalid relic: {}", e)))?;
    }
    for (key, result) in &self.calculations {
      if key.is_empty() || !result.total.is_finite() {
        return Err(Error::ImportFormat(format!(
          "invalid cached calculation {:?}",
          key
        )));
      }
    }
    Ok(())
  }
}
