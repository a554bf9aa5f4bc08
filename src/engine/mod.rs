//! Attack-multiplier calculation engine.
//!
//! `calculate` validates its input, consults the shared result cache and, on
//! a miss, runs the phase pipeline (base, synergy, conditional,
//! environmental, interactions, assembly) before storing the result.

mod config;
mod hooks;
mod key;
mod metrics;
mod pipeline;
mod result;
mod state;

pub use config::{EngineConfig, EnvironmentBonuses};
pub use hooks::{ComboRule, Hooks, RelicBonus};
pub use key::derive_key;
pub use metrics::{CalculationMetrics, EngineStats};
pub use pipeline::{average_difficulty, category_synergy, effect_type_synergy};
pub use result::{
  round_to, CalculationResult, CalculationTier, EffectContribution, Penalty, Phase,
  RelicContribution, ResultMetadata, TraceStep,
};
pub use state::CalculationState;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, warn};

use crate::cache::{Cache, SetOptions};
use crate::error::{Error, Result};
use crate::relic::{CalculationContext, Relic, RuntimeConditions};
use metrics::MetricsHistory;
use pipeline::Pipeline;

/// Per-call switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalculateOptions {
  /// Read through and write through the result cache
  pub use_cache: bool,
  /// Attach an ordered step trace to the result
  pub debug: bool,
  /// Overrides the configured precision
  pub precision: Option<u32>,
  /// Fail once more than this many effects have been evaluated
  pub max_complexity: Option<usize>,
}

impl Default for CalculateOptions {
  fn default() -> Self {
    Self {
      use_cache: true,
      debug: false,
      precision: None,
      max_complexity: None,
    }
  }
}

impl CalculateOptions {
  pub fn uncached() -> Self {
    Self {
      use_cache: false,
      ..Self::default()
    }
  }

  pub fn traced() -> Self {
    Self {
      debug: true,
      ..Self::default()
    }
  }
}

pub struct CalculationEngine {
  config: EngineConfig,
  hooks: Hooks,
  cache: Arc<Cache<CalculationResult>>,
  metrics: Mutex<MetricsHistory>,
  pipeline_runs: AtomicU64,
}

impl CalculationEngine {
  pub fn new(config: EngineConfig) -> Self {
    let cache = Arc::new(Cache::new(config.cache.clone()));
    Self::with_cache(config, cache)
  }

  /// Build an engine around an existing result cache.
  pub fn with_cache(config: EngineConfig, cache: Arc<Cache<CalculationResult>>) -> Self {
    Self {
      config,
      hooks: Hooks::default(),
      cache,
      metrics: Mutex::new(MetricsHistory::default()),
      pipeline_runs: AtomicU64::new(0),
    }
  }

  pub fn with_hooks(mut self, hooks: Hooks) -> Self {
    self.hooks = hooks;
    self
  }

  pub fn config(&self) -> &EngineConfig {
    &self.config
  }

  pub fn cache(&self) -> &Arc<Cache<CalculationResult>> {
    &self.cache
  }

  /// Start the result cache's background timers.
  pub fn start(&self) {
    self.cache.start_maintenance();
  }

  pub async fn shutdown(&self) {
    self.cache.stop_maintenance().await;
  }

  /// Reject malformed input before anything else happens.
  pub fn validate(&self, relics: &[Relic], conditions: &RuntimeConditions) -> Result<()> {
    if relics.len() > self.config.max_relics {
      return Err(Error::Validation(format!(
        "at most {} relics may be combined, got {}",
        self.config.max_relics,
        relics.len()
      )));
    }
    for relic in relics {
      relic.validate().map_err(Error::Validation)?;
    }
    conditions.validate().map_err(Error::Validation)
  }

  /// Compute the attack multiplier for a relic combination.
  pub async fn calculate(
    &self,
    relics: &[Relic],
    conditions: &RuntimeConditions,
    context: Option<&CalculationContext>,
    options: CalculateOptions,
  ) -> Result<CalculationResult> {
    self.validate(relics, conditions)?;

    let started_at = Utc::now();
    let clock = Instant::now();
    let precision = options.precision.unwrap_or(self.config.precision);
    let salt = format!("p{}:d{}", precision, options.debug);
    let cache_key = derive_key(relics, conditions, context, &salt)?;

    if options.use_cache {
      if let Some(hit) = self.cache.get(&cache_key) {
        debug!(key = %cache_key, relics = relics.len(), "calculation cache hit");
        self.record(started_at, clock, relics.len(), true);
        return Ok(hit);
      }
    }

    let outcome = self.run_pipeline(relics, conditions, context, options, precision, cache_key);
    self.record(started_at, clock, relics.len(), false);
    let result = outcome?;

    if options.use_cache {
      if let Err(e) = self.cache.set(
        result.metadata.cache_key.clone(),
        result.clone(),
        SetOptions::default(),
      ) {
        warn!(error = %e, "failed to cache calculation result");
      }
    }

    debug!(
      total = result.total,
      base = result.base,
      synergy = result.synergy,
      conditional = result.conditional,
      environmental = result.environmental,
      "calculation complete"
    );
    Ok(result)
  }

  fn run_pipeline(
    &self,
    relics: &[Relic],
    conditions: &RuntimeConditions,
    context: Option<&CalculationContext>,
    options: CalculateOptions,
    precision: u32,
    cache_key: String,
  ) -> Result<CalculationResult> {
    let clock = Instant::now();
    self.pipeline_runs.fetch_add(1, Ordering::Relaxed);

    let pipeline = Pipeline {
      config: &self.config,
      hooks: &self.hooks,
      budget: options.max_complexity,
    };
    let mut state = CalculationState::new(relics, conditions, context, options.debug);
    pipeline.run(&mut state)?;

    let metadata = ResultMetadata {
      calculated_at: Utc::now(),
      cache_key,
      duration_ms: clock.elapsed().as_secs_f64() * 1000.0,
      effects_evaluated: state.effects_evaluated,
      tier: CalculationTier::Full,
      offline: false,
    };
    Ok(pipeline.assemble(&mut state, metadata, precision))
  }

  fn record(&self, started_at: DateTime<Utc>, clock: Instant, relic_count: usize, hit: bool) {
    let record = CalculationMetrics {
      started_at,
      finished_at: Utc::now(),
      duration_ms: clock.elapsed().as_secs_f64() * 1000.0,
      relic_count,
      cache_hit: hit,
    };
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(record);
  }

  pub fn cache_stats(&self) -> EngineStats {
    let metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
    EngineStats {
      calculations: metrics.len(),
      pipeline_runs: self.pipeline_runs.load(Ordering::Relaxed),
      hit_rate: metrics.hit_rate(),
      average_latency_ms: metrics.average_latency_ms(),
      cache: self.cache.stats(),
    }
  }

  /// Most recent per-call metrics, oldest first.
  pub fn recent_metrics(&self, n: usize) -> Vec<CalculationMetrics> {
    self
      .metrics
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .recent(n)
      .to_vec()
  }

  pub fn clear_cache(&self) {
    self.cache.clear();
  }
}
