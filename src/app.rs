use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use relicalc::cache::{KeyValueStore, MemoryStore, NoopStore, SqliteStore};
use relicalc::engine::{CalculateOptions, CalculationEngine, CalculationResult};
use relicalc::offline::{OfflineCalculator, OfflineStatus};
use relicalc::relic::{CalculationContext, RuntimeConditions};
use relicalc::source::{FileRelicSource, HttpRelicSource, RelicSource};

use crate::config::{Config, StorageBackend};

/// Composition root: owns the engine, the offline wrapper and storage.
pub struct App {
  engine: Arc<CalculationEngine>,
  offline: Arc<OfflineCalculator>,
}

impl App {
  /// Build every component from `config`. `catalog` overrides the configured source.
  pub fn new(config: &Config, catalog: Option<PathBuf>) -> Result<Self> {
    let engine = Arc::new(CalculationEngine::new(config.engine.clone()));
    let source = Self::build_source(config, catalog)?;
    let store = Self::build_store(config)?;

    let offline = OfflineCalculator::new(Arc::clone(&engine), source, config.offline.clone())
      .with_store(store);

    Ok(Self {
      engine,
      offline: Arc::new(offline),
    })
  }

  fn build_source(config: &Config, catalog: Option<PathBuf>) -> Result<Arc<dyn RelicSource>> {
    if let Some(path) = catalog {
      return Ok(Arc::new(FileRelicSource::new(path)));
    }
    if let Some(url) = config.source.url.as_deref() {
      let source =
        HttpRelicSource::new(url).map_err(|e| eyre!("Invalid relic source {}: {}", url, e))?;
      return Ok(Arc::new(source));
    }
    if let Some(path) = config.source.path.clone() {
      return Ok(Arc::new(FileRelicSource::new(path)));
    }
    Err(eyre!(
      "No relic catalog configured. Pass --catalog or set source.url in the config file."
    ))
  }

  fn build_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    let store: Arc<dyn KeyValueStore> = match config.storage.backend {
      StorageBackend::Sqlite => {
        let opened = match config.storage.path.as_deref() {
          Some(path) => SqliteStore::open_at(path),
          None => SqliteStore::open(),
        };
        Arc::new(opened.map_err(|e| eyre!("Failed to open local store: {}", e))?)
      }
      StorageBackend::Memory => Arc::new(MemoryStore::new()),
      StorageBackend::None => Arc::new(NoopStore),
    };
    Ok(store)
  }

  /// Start timers, restore the persisted replica and refresh it from the source.
  pub async fn start(&self) -> Result<()> {
    self.engine.start();
    self.offline.start();

    match self.offline.restore().await {
      Ok(true) => info!("restored offline replica"),
      Ok(false) => {}
      Err(e) => warn!(error = %e, "ignoring unreadable offline replica"),
    }

    if !self.offline.force_sync().await && self.offline.status().relic_count == 0 {
      return Err(eyre!("Relic catalog unavailable and no offline replica stored"));
    }
    Ok(())
  }

  /// Full pipeline over relics looked up in the local replica.
  pub async fn calculate(
    &self,
    ids: &[String],
    conditions: &RuntimeConditions,
    context: Option<&CalculationContext>,
    options: CalculateOptions,
  ) -> Result<CalculationResult> {
    let relics = self.offline.resolve(ids)?;
    Ok(
      self
        .engine
        .calculate(&relics, conditions, context, options)
        .await?,
    )
  }

  pub async fn calculate_offline(
    &self,
    ids: &[String],
    conditions: &RuntimeConditions,
  ) -> Result<CalculationResult> {
    let relics = self.offline.resolve(ids)?;
    Ok(self.offline.calculate_offline(&relics, conditions).await?)
  }

  pub fn offline_status(&self) -> OfflineStatus {
    self.offline.status()
  }

  /// Persist the replica and stop every background task.
  pub async fn shutdown(&self) {
    if let Err(e) = self.offline.persist().await {
      warn!(error = %e, "failed to persist offline replica");
    }
    self.offline.shutdown().await;
    self.engine.shutdown().await;
    info!("shutdown complete");
  }
}
