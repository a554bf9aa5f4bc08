//! Rolling per-call metrics for the calculation engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

/// Records kept before the history is trimmed.
const MAX_RECORDS: usize = 1000;
/// Records retained after a trim.
const RETAINED_RECORDS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetrics {
  pub started_at: DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub duration_ms: f64,
  pub relic_count: usize,
  pub cache_hit: bool,
}

#[derive(Debug, Default)]
pub(crate) struct MetricsHistory {
  records: Vec<CalculationMetrics>,
}

impl MetricsHistory {
  pub fn push(&mut self, record: CalculationMetrics) {
    self.records.push(record);
    if self.records.len() > MAX_RECORDS {
      let excess = self.records.len() - RETAINED_RECORDS;
      self.records.drain(..excess);
    }
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn recent(&self, n: usize) -> &[CalculationMetrics] {
    let start = self.records.len().saturating_sub(n);
    &self.records[start..]
  }

  pub fn hit_rate(&self) -> f64 {
    if self.records.is_empty() {
      return 0.0;
    }
    let hits = self.records.iter().filter(|r| r.cache_hit).count();
    hits as f64 / self.records.len() as f64
  }

  pub fn average_latency_ms(&self) -> f64 {
    if self.records.is_empty() {
      return 0.0;
    }
    self.records.iter().map(|r| r.duration_ms).sum::<f64>() / self.records.len() as f64
  }
}

/// Engine-level statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStats {
  /// Calls in the rolling history
  pub calculations: usize,
  /// Pipeline executions since construction
  pub pipeline_runs: u64,
  pub hit_rate: f64,
  pub average_latency_ms: f64,
  pub cache: CacheStats,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(cache_hit: bool, duration_ms: f64) -> CalculationMetrics {
    let now = Utc::now();
    CalculationMetrics {
      started_at: now,
      finished_at: now,
      duration_ms,
      relic_count: 1,
      cache_hit,
    }
  }

  #[test]
  fn test_history_trims_to_recent() {
    let mut history = MetricsHistory::default();
    for i in 0..=MAX_RECORDS {
      history.push(record(false, i as f64));
    }
    assert_eq!(history.len(), RETAINED_RECORDS);
    assert_eq!(history.recent(1)[0].duration_ms, MAX_RECORDS as f64);
  }

  #[test]
  fn test_hit_rate_and_latency() {
    let mut history = MetricsHistory::default();
    history.push(record(true, 1.0));
    history.push(record(false, 3.0));
    assert_eq!(history.hit_rate(), 0.5);
    assert_eq!(history.average_latency_ms(), 2.0);
  }
}
