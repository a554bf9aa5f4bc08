//! Offline degradation around the calculation engine.
//!
//! Keeps a local replica of the relic catalog and answers calculations from
//! it at a configurable tier, demoting silently when a tier fails.

mod replica;
mod sync;
mod tiers;

pub use replica::{ReplicaDocument, ReplicaMetadata};
pub use sync::Connectivity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::cache::{Cache, CacheOptions, KeyValueStore, MaintenanceHandle, SetOptions};
use crate::engine::{
  derive_key, CalculateOptions, CalculationEngine, CalculationResult, CalculationTier,
};
use crate::error::Result;
use crate::relic::{Relic, RuntimeConditions};
use crate::source::RelicSource;
use replica::Replica;
use tiers::Bounds;

/// Storage key of the persisted replica document.
pub const REPLICA_KEY: &str = "relicalc:offline-replica";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
  /// Highest tier attempted. `full` is treated as `advanced`, and
  /// `fallback` as `basic` while fallback is disabled.
  #[serde(default = "default_max_tier")]
  pub max_tier: CalculationTier,
  #[serde(default = "default_true")]
  pub enable_fallback: bool,
  #[serde(default = "default_true")]
  pub sync_enabled: bool,
  #[serde(default = "default_sync_interval_secs")]
  pub sync_interval_secs: u64,
  /// Effect evaluations allowed in the advanced tier
  #[serde(default = "default_complexity_budget")]
  pub complexity_budget: usize,
  #[serde(default = "default_offline_cache")]
  pub cache: CacheOptions,
}

impl Default for OfflineConfig {
  fn default() -> Self {
    OfflineConfig {
      max_tier: default_max_tier(),
      enable_fallback: true,
      sync_enabled: true,
      sync_interval_secs: default_sync_interval_secs(),
      complexity_budget: default_complexity_budget(),
      cache: default_offline_cache(),
    }
  }
}

fn default_max_tier() -> CalculationTier {
  CalculationTier::Advanced
}
fn default_true() -> bool {
  true
}
fn default_sync_interval_secs() -> u64 {
  300
}
fn default_complexity_budget() -> usize {
  24
}
fn default_offline_cache() -> CacheOptions {
  CacheOptions::default().with_max_size(500)
}

/// Snapshot of the offline wrapper's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineStatus {
  pub is_online: bool,
  pub last_sync: Option<DateTime<Utc>>,
  pub relic_count: usize,
  pub calculation_count: u64,
  pub cache_size: usize,
}

pub struct OfflineCalculator {
  engine: Arc<CalculationEngine>,
  source: Arc<dyn RelicSource>,
  store: Option<Arc<dyn KeyValueStore>>,
  config: OfflineConfig,
  replica: RwLock<Replica>,
  cache: Cache<CalculationResult>,
  online: AtomicBool,
  syncing: AtomicBool,
  calculations: AtomicU64,
  sync_timer: Mutex<Option<MaintenanceHandle>>,
}

impl OfflineCalculator {
  /// Starts offline with an empty replica.
  pub fn new(
    engine: Arc<CalculationEngine>,
    source: Arc<dyn RelicSource>,
    config: OfflineConfig,
  ) -> Self {
    let cache = Cache::new(config.cache.clone());
    Self {
      engine,
      source,
      store: None,
      config,
      replica: RwLock::new(Replica::default()),
      cache,
      online: AtomicBool::new(false),
      syncing: AtomicBool::new(false),
      calculations: AtomicU64::new(0),
      sync_timer: Mutex::new(None),
    }
  }

  /// Persist the replica through `store` after each sync.
  pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
    self.store = Some(store);
    self
  }

  pub fn config(&self) -> &OfflineConfig {
    &self.config
  }

  pub fn cache(&self) -> &Cache<CalculationResult> {
    &self.cache
  }

  pub fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }

  fn read_replica(&self) -> RwLockReadGuard<'_, Replica> {
    self.replica.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write_replica(&self) -> RwLockWriteGuard<'_, Replica> {
    self.replica.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Replica copies of the requested relics, in request order.
  pub fn resolve<S: AsRef<str>>(&self, ids: &[S]) -> Result<Vec<Relic>> {
    self.read_replica().resolve(ids)
  }

  /// Full replica catalog sorted by id.
  pub fn relics(&self) -> Vec<Relic> {
    self.read_replica().sorted()
  }

  /// Calculate from the local replica without any network access.
  pub async fn calculate_offline(
    &self,
    relics: &[Relic],
    conditions: &RuntimeConditions,
  ) -> Result<CalculationResult> {
    self.engine.validate(relics, conditions)?;
    let ids: Vec<&str> = relics.iter().map(|r| r.id.as_str()).collect();
    let (local, version) = {
      let replica = self.read_replica();
      (replica.resolve(&ids)?, replica.version)
    };

    let ceiling = self.ceiling();
    let key = format!(
      "{}:{}",
      ceiling,
      derive_key(&local, conditions, None, "offline")?
    );

    if let Some(hit) = self.cache.get(&key) {
      debug!(key = %key, tier = %hit.metadata.tier, "offline cache hit");
      self.calculations.fetch_add(1, Ordering::Relaxed);
      return Ok(hit);
    }

    let result = self.run_tier(ceiling, &local, conditions, key.clone()).await?;
    self.cache_if_current(version, key, &result);
    self.calculations.fetch_add(1, Ordering::Relaxed);
    debug!(tier = %result.metadata.tier, total = result.total, "offline calculation complete");
    Ok(result)
  }

  /// Configured ceiling. `full` runs as `advanced`, and a `fallback`
  /// ceiling runs as `basic` unless fallback is enabled.
  pub fn ceiling(&self) -> CalculationTier {
    match self.config.max_tier {
      CalculationTier::Fallback if !self.config.enable_fallback => CalculationTier::Basic,
      tier => tier.min(CalculationTier::Advanced),
    }
  }

  /// Cache `result` unless a sync replaced the replica after `version` was read.
  ///
  /// The replica read lock is held across the insert so a concurrent sync
  /// clears the cache after it.
  fn cache_if_current(&self, version: u64, key: String, result: &CalculationResult) -> bool {
    let replica = self.read_replica();
    if replica.version != version {
      debug!(key = %key, "replica changed during calculation, result not cached");
      return false;
    }
    if let Err(e) = self.cache.set(key, result.clone(), SetOptions::default()) {
      warn!(error = %e, "failed to cache offline result");
      return false;
    }
    true
  }

  async fn run_tier(
    &self,
    ceiling: CalculationTier,
    relics: &[Relic],
    conditions: &RuntimeConditions,
    key: String,
  ) -> Result<CalculationResult> {
    let bounds = Bounds {
      precision: self.engine.config().precision,
      hard_cap: self.engine.config().hard_cap,
    };

    let attempt = match ceiling {
      CalculationTier::Fallback => {
        return Ok(tiers::fallback(relics).into_result(key, bounds));
      }
      CalculationTier::Basic => tiers::basic(relics).map(|e| e.into_result(key.clone(), bounds)),
      CalculationTier::Intermediate => {
        tiers::intermediate(relics, conditions).map(|e| e.into_result(key.clone(), bounds))
      }
      CalculationTier::Advanced | CalculationTier::Full => {
        match self.advanced(relics, conditions, &key, bounds).await {
          Ok(result) => Ok(result),
          Err(e) => {
            warn!(error = %e, "advanced tier failed, demoting to intermediate");
            tiers::intermediate(relics, conditions).map(|e| e.into_result(key.clone(), bounds))
          }
        }
      }
    };

    match attempt {
      Ok(result) => Ok(result),
      Err(e) if self.config.enable_fallback => {
        warn!(error = %e, "offline tiers failed, using fallback estimate");
        Ok(tiers::fallback(relics).into_result(key, bounds))
      }
      Err(e) => Err(e),
    }
  }

  async fn advanced(
    &self,
    relics: &[Relic],
    conditions: &RuntimeConditions,
    key: &str,
    bounds: Bounds,
  ) -> Result<CalculationResult> {
    let options = CalculateOptions {
      use_cache: false,
      debug: false,
      precision: Some(bounds.precision),
      max_complexity: Some(self.config.complexity_budget),
    };
    let mut result = self.engine.calculate(relics, conditions, None, options).await?;
    result.total = result.total.clamp(0.0, bounds.hard_cap);
    result.metadata.cache_key = key.to_string();
    result.metadata.tier = CalculationTier::Advanced;
    result.metadata.offline = true;
    Ok(result)
  }

  pub fn status(&self) -> OfflineStatus {
    let replica = self.read_replica();
    OfflineStatus {
      is_online: self.is_online(),
      last_sync: replica.last_sync,
      relic_count: replica.relics.len(),
      calculation_count: self.calculations.load(Ordering::Relaxed),
      cache_size: self.cache.len(),
    }
  }

  /// Write the replica document to the configured store.
  pub async fn persist(&self) -> Result<()> {
    let Some(store) = self.store.as_ref() else {
      return Ok(());
    };
    let document = self.export();
    let json = serde_json::to_string(&document)?;
    store.set(REPLICA_KEY, json).await?;
    debug!(
      relics = document.metadata.relic_count,
      calculations = document.calculations.len(),
      "offline replica persisted"
    );
    Ok(())
  }

  /// Load the replica document from the configured store.
  ///
  /// Returns `false` when nothing has been persisted yet.
  pub async fn restore(&self) -> Result<bool> {
    let Some(store) = self.store.as_ref() else {
      return Ok(false);
    };
    let Some(json) = store.get(REPLICA_KEY).await? else {
      return Ok(false);
    };
    let document = ReplicaDocument::parse(&json)?;
    self.import(document)?;
    Ok(true)
  }

  pub fn export(&self) -> ReplicaDocument {
    let replica = self.read_replica();
    let relics = replica.sorted();
    ReplicaDocument {
      metadata: ReplicaMetadata {
        last_sync: replica.last_sync,
        version: replica.version,
        relic_count: relics.len(),
        calculation_count: self.calculations.load(Ordering::Relaxed),
      },
      relics,
      calculations: self
        .cache
        .entries()
        .into_iter()
        .filter(|entry| entry.value.is_finite())
        .map(|entry| (entry.key, entry.value))
        .collect(),
    }
  }

  fn import(&self, document: ReplicaDocument) -> Result<()> {
    {
      let mut replica = self.write_replica();
      replica.relics = document
        .relics
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();
      replica.last_sync = document.metadata.last_sync;
      replica.version = document.metadata.version;
    }
    self.cache.clear();
    self
      .cache
      .set_multiple(document.calculations, SetOptions::default())?;
    self
      .calculations
      .store(document.metadata.calculation_count, Ordering::Relaxed);
    Ok(())
  }

  /// Stop the sync timer and the result cache's timers.
  pub async fn shutdown(&self) {
    self.stop_sync_timer().await;
    self.cache.stop_maintenance().await;
  }
}

impl Drop for OfflineCalculator {
  fn drop(&mut self) {
    let timer = self
      .sync_timer
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(timer) = timer {
      timer.abort();
    }
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::cache::MemoryStore;
  use crate::engine::EngineConfig;
  use crate::error::Error;
  use crate::relic::{Condition, Effect, EffectType, RelicCategory};
  use crate::source::StaticRelicSource;
  use futures::future::BoxFuture;
  use std::sync::atomic::AtomicUsize;

  pub(crate) fn catalog() -> Vec<Relic> {
    vec![
      Relic::new("r1", RelicCategory::Weapon, 1.25),
      Relic::new("r2", RelicCategory::Weapon, 1.10).with_effect(
        Effect::new(EffectType::ConditionalDamage, 15.0).when(Condition::enemy("boss")),
      ),
      Relic::new("r3", RelicCategory::Armor, 1.05),
    ]
  }

  /// Source that counts fetches and can be made to fail.
  #[derive(Default)]
  pub(crate) struct CountingSource {
    pub relics: Mutex<Vec<Relic>>,
    pub fetches: AtomicUsize,
    pub fail: AtomicBool,
  }

  impl CountingSource {
    pub fn with(relics: Vec<Relic>) -> Self {
      Self {
        relics: Mutex::new(relics),
        ..Default::default()
      }
    }
  }

  impl RelicSource for CountingSource {
    fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Relic>>> {
      Box::pin(async move {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail.load(Ordering::SeqCst) {
          return Err(Error::Sync("catalog unavailable".to_string()));
        }
        Ok(self.relics.lock().unwrap().clone())
      })
    }
  }

  pub(crate) fn calculator(config: OfflineConfig) -> OfflineCalculator {
    let engine = Arc::new(CalculationEngine::new(EngineConfig::default()));
    let source = Arc::new(StaticRelicSource::new(catalog()));
    OfflineCalculator::new(engine, source, config)
  }

  async fn synced(config: OfflineConfig) -> OfflineCalculator {
    let calculator = calculator(config);
    assert!(calculator.force_sync().await);
    calculator
  }

  fn at_tier(tier: CalculationTier) -> OfflineConfig {
    OfflineConfig {
      max_tier: tier,
      ..Default::default()
    }
  }

  fn request() -> Vec<Relic> {
    vec![
      Relic::new("r1", RelicCategory::Weapon, 1.25),
      Relic::new("r2", RelicCategory::Weapon, 1.10),
    ]
  }

  #[tokio::test]
  async fn test_basic_tier_isolation() {
    let calculator = synced(at_tier(CalculationTier::Basic)).await;
    let result = calculator
      .calculate_offline(&request(), &RuntimeConditions::against("boss"))
      .await
      .unwrap();
    assert_eq!(result.synergy, 0.0);
    assert_eq!(result.conditional, 0.0);
    assert_eq!(result.total, 2.35);
    assert_eq!(result.metadata.tier, CalculationTier::Basic);
    assert!(result.metadata.offline);
  }

  #[tokio::test]
  async fn test_advanced_tier_uses_replica_data() {
    let calculator = synced(OfflineConfig::default()).await;
    let result = calculator
      .calculate_offline(&request(), &RuntimeConditions::against("boss"))
      .await
      .unwrap();
    // The replica's r2 carries the boss effect even though the request's copy does not.
    assert_eq!(result.total, 2.65);
    assert_eq!(result.metadata.tier, CalculationTier::Advanced);
    assert!(result.metadata.offline);
  }

  #[tokio::test]
  async fn test_advanced_demotes_to_intermediate() {
    let config = OfflineConfig {
      complexity_budget: 0,
      ..Default::default()
    };
    let calculator = synced(config).await;
    let result = calculator
      .calculate_offline(&request(), &RuntimeConditions::against("boss"))
      .await
      .unwrap();
    assert_eq!(result.metadata.tier, CalculationTier::Intermediate);
    assert_eq!(result.synergy, 0.1);
    // 2.35 + 0.10 pair + 0.5 × 0.15, rounded to two places
    assert!((result.total - 2.525).abs() <= 0.005 + 1e-9);
  }

  #[tokio::test]
  async fn test_fallback_when_tiers_fail() {
    let mut catalog = catalog();
    catalog.push(Relic::new("huge", RelicCategory::Artifact, f64::MAX));
    catalog.push(Relic::new("huger", RelicCategory::Consumable, f64::MAX));
    let engine = Arc::new(CalculationEngine::new(EngineConfig::default()));
    let calculator = OfflineCalculator::new(
      engine,
      Arc::new(StaticRelicSource::new(catalog)),
      at_tier(CalculationTier::Basic),
    );
    assert!(calculator.force_sync().await);

    let relics = vec![
      Relic::new("huge", RelicCategory::Artifact, 1.0),
      Relic::new("huger", RelicCategory::Consumable, 1.0),
    ];
    let result = calculator
      .calculate_offline(&relics, &RuntimeConditions::default())
      .await
      .unwrap();
    assert_eq!(result.metadata.tier, CalculationTier::Fallback);
    assert_eq!(result.total, 10.0);
  }

  #[tokio::test]
  async fn test_fallback_ceiling_requires_fallback_enabled() {
    let config = OfflineConfig {
      enable_fallback: false,
      ..at_tier(CalculationTier::Fallback)
    };
    let calculator = synced(config).await;
    assert_eq!(calculator.ceiling(), CalculationTier::Basic);
    let result = calculator
      .calculate_offline(&request(), &RuntimeConditions::default())
      .await
      .unwrap();
    assert_eq!(result.metadata.tier, CalculationTier::Basic);
    assert_eq!(result.total, 2.35);

    let enabled = synced(at_tier(CalculationTier::Fallback)).await;
    assert_eq!(enabled.ceiling(), CalculationTier::Fallback);
    let full = synced(at_tier(CalculationTier::Full)).await;
    assert_eq!(full.ceiling(), CalculationTier::Advanced);
  }

  #[tokio::test]
  async fn test_overflowing_fallback_survives_restore() {
    let mut catalog = catalog();
    catalog.push(Relic::new("huge", RelicCategory::Artifact, f64::MAX));
    catalog.push(Relic::new("huger", RelicCategory::Consumable, f64::MAX));
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let engine = Arc::new(CalculationEngine::new(EngineConfig::default()));
    let calculator = OfflineCalculator::new(
      engine,
      Arc::new(StaticRelicSource::new(catalog)),
      at_tier(CalculationTier::Basic),
    )
    .with_store(store.clone());
    assert!(calculator.force_sync().await);

    let relics = vec![
      Relic::new("huge", RelicCategory::Artifact, 1.0),
      Relic::new("huger", RelicCategory::Consumable, 1.0),
    ];
    let result = calculator
      .calculate_offline(&relics, &RuntimeConditions::default())
      .await
      .unwrap();
    assert_eq!(result.metadata.tier, CalculationTier::Fallback);
    assert!(result.is_finite());
    calculator.persist().await.unwrap();

    let restored = calculator_with_store(store);
    assert!(restored.restore().await.unwrap());
    assert_eq!(restored.status().relic_count, 5);
  }

  #[tokio::test]
  async fn test_export_skips_non_finite_results() {
    let calculator = synced(OfflineConfig::default()).await;
    let mut result = calculator
      .calculate_offline(&request(), &RuntimeConditions::default())
      .await
      .unwrap();
    result.base = f64::INFINITY;
    calculator
      .cache()
      .set("bad".to_string(), result, SetOptions::default())
      .unwrap();
    assert_eq!(calculator.status().cache_size, 2);
    let document = calculator.export();
    assert_eq!(document.calculations.len(), 1);
    assert!(document.calculations.iter().all(|(key, _)| key != "bad"));
  }

  #[tokio::test]
  async fn test_stale_result_is_not_cached_after_sync() {
    let calculator = synced(OfflineConfig::default()).await;
    let version = calculator.read_replica().version;
    let result = calculator
      .calculate_offline(&request(), &RuntimeConditions::default())
      .await
      .unwrap();
    let key = result.metadata.cache_key.clone();

    assert!(calculator.force_sync().await);
    assert_eq!(calculator.status().cache_size, 0);
    assert!(!calculator.cache_if_current(version, key.clone(), &result));
    assert_eq!(calculator.status().cache_size, 0);

    let current = calculator.read_replica().version;
    assert!(calculator.cache_if_current(current, key, &result));
    assert_eq!(calculator.status().cache_size, 1);
  }

  #[tokio::test]
  async fn test_no_fallback_propagates() {
    let mut catalog = catalog();
    catalog.push(Relic::new("huge", RelicCategory::Artifact, f64::MAX));
    catalog.push(Relic::new("huger", RelicCategory::Consumable, f64::MAX));
    let engine = Arc::new(CalculationEngine::new(EngineConfig::default()));
    let calculator = OfflineCalculator::new(
      engine,
      Arc::new(StaticRelicSource::new(catalog)),
      OfflineConfig {
        enable_fallback: false,
        ..at_tier(CalculationTier::Basic)
      },
    );
    assert!(calculator.force_sync().await);
    let relics = vec![
      Relic::new("huge", RelicCategory::Artifact, 1.0),
      Relic::new("huger", RelicCategory::Consumable, 1.0),
    ];
    let err = calculator
      .calculate_offline(&relics, &RuntimeConditions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::CalculationFailure { .. }));
  }

  #[tokio::test]
  async fn test_missing_offline_data() {
    let calculator = synced(OfflineConfig::default()).await;
    let relics = vec![
      Relic::new("r1", RelicCategory::Weapon, 1.0),
      Relic::new("ghost", RelicCategory::Weapon, 1.0),
    ];
    let err = calculator
      .calculate_offline(&relics, &RuntimeConditions::default())
      .await
      .unwrap_err();
    assert_eq!(
      err,
      Error::MissingOfflineData {
        ids: vec!["ghost".to_string()]
      }
    );
    assert_eq!(calculator.status().calculation_count, 0);
  }

  #[tokio::test]
  async fn test_validation_runs_first() {
    let calculator = calculator(OfflineConfig::default());
    let relics: Vec<Relic> = (0..10)
      .map(|i| Relic::new(format!("x{}", i), RelicCategory::Weapon, 1.0))
      .collect();
    let err = calculator
      .calculate_offline(&relics, &RuntimeConditions::default())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[tokio::test]
  async fn test_results_are_cached_per_tier() {
    let calculator = synced(at_tier(CalculationTier::Intermediate)).await;
    let conditions = RuntimeConditions::against("boss");
    let first = calculator
      .calculate_offline(&request(), &conditions)
      .await
      .unwrap();
    let second = calculator
      .calculate_offline(&request(), &conditions)
      .await
      .unwrap();
    assert_eq!(first, second);
    assert!(first.metadata.cache_key.starts_with("intermediate:calc:"));

    let status = calculator.status();
    assert_eq!(status.cache_size, 1);
    assert_eq!(status.calculation_count, 2);
    assert_eq!(calculator.cache().stats().hits, 1);
  }

  #[tokio::test]
  async fn test_persist_and_restore() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let calculator = synced(OfflineConfig::default()).await.with_store(store.clone());
    calculator
      .calculate_offline(&request(), &RuntimeConditions::default())
      .await
      .unwrap();
    calculator.persist().await.unwrap();

    let restored = calculator_with_store(store.clone());
    assert!(restored.restore().await.unwrap());
    let status = restored.status();
    assert_eq!(status.relic_count, 3);
    assert_eq!(status.cache_size, 1);
    assert_eq!(status.calculation_count, 1);
    assert_eq!(status.last_sync, calculator.status().last_sync);
    assert_eq!(restored.relics(), calculator.relics());
    let keys = |c: &OfflineCalculator| -> Vec<String> {
      c.export().calculations.into_iter().map(|(k, _)| k).collect()
    };
    assert_eq!(keys(&restored), keys(&calculator));
  }

  #[tokio::test]
  async fn test_restore_without_document() {
    let restored = calculator_with_store(Arc::new(MemoryStore::new()));
    assert!(!restored.restore().await.unwrap());
    assert!(!calculator(OfflineConfig::default()).restore().await.unwrap());
  }

  #[tokio::test]
  async fn test_restore_rejects_corrupt_document() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    store
      .set(REPLICA_KEY, "{not json".to_string())
      .await
      .unwrap();
    let restored = calculator_with_store(store);
    assert!(matches!(
      restored.restore().await,
      Err(Error::ImportFormat(_))
    ));
    assert_eq!(restored.status().relic_count, 0);
  }

  fn calculator_with_store(store: Arc<dyn KeyValueStore>) -> OfflineCalculator {
    calculator(OfflineConfig::default()).with_store(store)
  }

  #[test]
  fn test_offline_config_defaults() {
    let config: OfflineConfig = serde_yaml::from_str("max_tier: intermediate\n").unwrap();
    assert_eq!(config.max_tier, CalculationTier::Intermediate);
    assert_eq!(config.sync_interval_secs, 300);
    assert!(config.enable_fallback);
    assert_eq!(config.cache.max_size, 500);
  }
}
