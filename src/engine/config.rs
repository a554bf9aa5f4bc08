//! Tunable constants for the calculation pipeline.

use serde::{Deserialize, Serialize};

use crate::cache::CacheOptions;
use crate::relic::{default_relic_sets, RelicSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
  /// Decimal places kept in results
  #[serde(default = "default_precision")]
  pub precision: u32,
  /// Upper bound of the assembled total
  #[serde(default = "default_hard_cap")]
  pub hard_cap: f64,
  #[serde(default = "default_max_relics")]
  pub max_relics: usize,
  /// Pairwise bonus for relics sharing a category
  #[serde(default = "default_type_synergy")]
  pub type_synergy: f64,
  /// Extra weight per prior activation of the same effect type
  #[serde(default = "default_stacking_step")]
  pub stacking_step: f64,
  /// Bonus level above which diminishing returns apply
  #[serde(default = "default_dr_threshold")]
  pub dr_threshold: f64,
  /// Share of the excess over `dr_threshold` taken back as a penalty
  #[serde(default = "default_dr_rate")]
  pub dr_rate: f64,
  #[serde(default)]
  pub environment: EnvironmentBonuses,
  #[serde(default = "default_relic_sets")]
  pub sets: Vec<RelicSet>,
  #[serde(default)]
  pub cache: CacheOptions,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      precision: default_precision(),
      hard_cap: default_hard_cap(),
      max_relics: default_max_relics(),
      type_synergy: default_type_synergy(),
      stacking_step: default_stacking_step(),
      dr_threshold: default_dr_threshold(),
      dr_rate: default_dr_rate(),
      environment: EnvironmentBonuses::default(),
      sets: default_relic_sets(),
      cache: CacheOptions::default(),
    }
  }
}

impl EngineConfig {
  pub fn validate(&self) -> Result<(), String> {
    if !(self.hard_cap.is_finite() && self.hard_cap > 0.0) {
      return Err("hard_cap must be a positive number".to_string());
    }
    if !(0.0..=1.0).contains(&self.dr_rate) {
      return Err("dr_rate must be between 0 and 1".to_string());
    }
    if self.max_relics == 0 {
      return Err("max_relics must be at least 1".to_string());
    }
    for set in &self.sets {
      if set.max_pieces == 0 || set.min_pieces > set.max_pieces {
        return Err(format!("set {} has an invalid piece range", set.id));
      }
    }
    Ok(())
  }
}

fn default_precision() -> u32 {
  2
}
fn default_hard_cap() -> f64 {
  10.0
}
fn default_max_relics() -> usize {
  9
}
fn default_type_synergy() -> f64 {
  0.15
}
fn default_stacking_step() -> f64 {
  0.5
}
fn default_dr_threshold() -> f64 {
  5.0
}
fn default_dr_rate() -> f64 {
  0.2
}

/// Flat additions from the calculation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentBonuses {
  #[serde(default = "default_night")]
  pub night: f64,
  /// Per seasonal effect
  #[serde(default = "default_seasonal")]
  pub seasonal: f64,
  /// Per environment bonus
  #[serde(default = "default_environment")]
  pub environment: f64,
}

impl Default for EnvironmentBonuses {
  fn default() -> Self {
    EnvironmentBonuses {
      night: default_night(),
      seasonal: default_seasonal(),
      environment: default_environment(),
    }
  }
}

fn default_night() -> f64 {
  0.05
}
fn default_seasonal() -> f64 {
  0.02
}
fn default_environment() -> f64 {
  0.03
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_config() {
    let config = EngineConfig::default();
    assert!((config.hard_cap - 10.0).abs() < f64::EPSILON);
    assert_eq!(config.max_relics, 9);
    assert_eq!(config.precision, 2);
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_parse_partial_config() {
    let yaml = r#"
precision: 3
dr_threshold: 4.0
environment:
  night: 0.1
"#;
    let config: EngineConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.precision, 3);
    assert!((config.environment.night - 0.1).abs() < f64::EPSILON);
    assert!((config.environment.seasonal - 0.02).abs() < f64::EPSILON);
    assert_eq!(config.sets.len(), 2);
  }

  #[test]
  fn test_invalid_dr_rate() {
    let config = EngineConfig {
      dr_rate: 1.5,
      ..Default::default()
    };
    assert!(config.validate().is_err());
  }
}
