//! Calculation output and provenance metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::relic::EffectType;

/// Which calculation path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationTier {
  /// Rarity-table estimate
  Fallback,
  /// Base multipliers only
  Basic,
  /// Base plus simplified synergy and conditions
  Intermediate,
  /// Full pipeline with a reduced budget
  Advanced,
  /// Full pipeline, online
  Full,
}

impl CalculationTier {
  pub fn as_str(self) -> &'static str {
    match self {
      CalculationTier::Fallback => "fallback",
      CalculationTier::Basic => "basic",
      CalculationTier::Intermediate => "intermediate",
      CalculationTier::Advanced => "advanced",
      CalculationTier::Full => "full",
    }
  }

  pub const ALL: [CalculationTier; 5] = [
    CalculationTier::Fallback,
    CalculationTier::Basic,
    CalculationTier::Intermediate,
    CalculationTier::Advanced,
    CalculationTier::Full,
  ];

  /// Whether the result skips parts of the full pipeline.
  pub fn is_approximate(self) -> bool {
    !matches!(self, CalculationTier::Full | CalculationTier::Advanced)
  }
}

impl std::fmt::Display for CalculationTier {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for CalculationTier {
  type Err = String;

  /// Accepts the serialized names, case-insensitively.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let wanted = s.trim().to_lowercase();
    CalculationTier::ALL
      .into_iter()
      .find(|tier| tier.as_str() == wanted)
      .ok_or_else(|| format!("unknown tier {:?}", s))
  }
}

/// Pipeline phase, used for trace steps and penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
  Base,
  Synergy,
  Conditional,
  Environmental,
  Interactions,
  Assembly,
}

impl Phase {
  pub fn as_str(self) -> &'static str {
    match self {
      Phase::Base => "base",
      Phase::Synergy => "synergy",
      Phase::Conditional => "conditional",
      Phase::Environmental => "environmental",
      Phase::Interactions => "interactions",
      Phase::Assembly => "assembly",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
  pub reason: String,
  pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelicContribution {
  pub relic_id: String,
  pub name: String,
  pub base: f64,
  pub conditional: f64,
  pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectContribution {
  pub relic_id: String,
  pub effect_type: EffectType,
  pub value: f64,
  pub stacking_multiplier: f64,
  pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
  pub phase: Phase,
  pub description: String,
  pub running_total: f64,
}

/// Timings and provenance for one result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
  pub calculated_at: DateTime<Utc>,
  pub cache_key: String,
  pub duration_ms: f64,
  pub effects_evaluated: usize,
  pub tier: CalculationTier,
  pub offline: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
  pub base: f64,
  pub synergy: f64,
  pub conditional: f64,
  pub environmental: f64,
  /// Sum of components minus penalties, clamped to `[0, hard_cap]`
  pub total: f64,
  pub efficiency: f64,
  pub average_difficulty: f64,
  pub penalties: Vec<Penalty>,
  pub relic_breakdown: Vec<RelicContribution>,
  pub effect_breakdown: Vec<EffectContribution>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trace: Option<Vec<TraceStep>>,
  pub metadata: ResultMetadata,
}

impl CalculationResult {
  /// Every numeric component is finite.
  pub fn is_finite(&self) -> bool {
    [
      self.base,
      self.synergy,
      self.conditional,
      self.environmental,
      self.total,
      self.efficiency,
      self.average_difficulty,
    ]
    .iter()
    .all(|v| v.is_finite())
  }
}

/// Round half away from zero to `precision` decimals.
///
/// Values too large to scale are returned unchanged.
pub fn round_to(value: f64, precision: u32) -> f64 {
  let factor = 10f64.powi(precision.min(12) as i32);
  let scaled = value * factor;
  if scaled.is_finite() {
    scaled.round() / factor
  } else {
    value
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_round_to() {
    assert_eq!(round_to(2.654, 2), 2.65);
    assert_eq!(round_to(2.655_1, 2), 2.66);
    assert_eq!(round_to(1.0, 0), 1.0);
    assert_eq!(round_to(f64::MAX, 2), f64::MAX);
  }

  #[test]
  fn test_tier_names_match_serde() {
    for tier in CalculationTier::ALL {
      let json = serde_json::to_string(&tier).unwrap();
      assert_eq!(json, format!("\"{}\"", tier));
      assert_eq!(tier.as_str().parse::<CalculationTier>(), Ok(tier));
    }
    assert_eq!("FULL".parse::<CalculationTier>(), Ok(CalculationTier::Full));
    assert!("turbo".parse::<CalculationTier>().is_err());
  }

  #[test]
  fn test_tier_ordering() {
    assert!(CalculationTier::Basic < CalculationTier::Intermediate);
    assert!(CalculationTier::Intermediate < CalculationTier::Advanced);
    assert!(CalculationTier::Basic.is_approximate());
    assert!(!CalculationTier::Full.is_approximate());
  }
}
