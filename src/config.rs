use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use relicalc::engine::EngineConfig;
use relicalc::offline::OfflineConfig;

/// Environment variable overriding `source.url`.
pub const SOURCE_URL_ENV: &str = "RELICALC_SOURCE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub engine: EngineConfig,
  #[serde(default)]
  pub offline: OfflineConfig,
  #[serde(default)]
  pub source: SourceConfig,
  #[serde(default)]
  pub storage: StorageConfig,
}

/// Where the authoritative relic catalog comes from.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
  /// Base URL serving `GET <url>/relics`
  pub url: Option<String>,
  /// Local JSON catalog, used when no URL is set
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  /// SQLite file under the user's data directory
  #[default]
  Sqlite,
  Memory,
  /// Nothing is persisted
  None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  #[serde(default)]
  pub backend: StorageBackend,
  /// Overrides the default SQLite location
  pub path: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./relicalc.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/relicalc/config.yaml
  ///
  /// Defaults apply when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };
    config.apply_env(std::env::var(SOURCE_URL_ENV).ok());
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("relicalc.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("relicalc").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file deserializes to unit, not to an empty mapping.
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  fn apply_env(&mut self, source_url: Option<String>) {
    if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
      self.source.url = Some(url);
    }
  }

  fn validate(&self) -> Result<()> {
    self
      .engine
      .validate()
      .map_err(|e| eyre!("Invalid engine configuration: {}", e))?;
    if self.offline.sync_interval_secs == 0 {
      return Err(eyre!("offline.sync_interval_secs must be at least 1"));
    }
    Ok(())
  }
}
