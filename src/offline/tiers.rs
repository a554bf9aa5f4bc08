//! Local estimation tiers that never touch the full pipeline.

use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Instant;

use crate::engine::{
  average_difficulty, round_to, CalculationResult, CalculationTier, EffectContribution,
  RelicContribution, ResultMetadata,
};
use crate::error::{Error, Result};
use crate::relic::{Relic, RelicCategory, RuntimeConditions};

/// Intermediate-tier bonus per pair of relics sharing a category.
const PAIR_BONUS: f64 = 0.10;
/// Share of an effect's scaled value counted by the intermediate tier.
const CONDITIONAL_SHARE: f64 = 0.5;
/// Fallback increment per effect on relics with no known multiplier.
const EFFECT_INCREMENT: f64 = 0.05;

/// Rounding and bounds shared by every tier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Bounds {
  pub precision: u32,
  pub hard_cap: f64,
}

/// Unrounded components collected by a tier.
#[derive(Debug)]
pub(crate) struct Estimate<'a> {
  relics: &'a [Relic],
  tier: CalculationTier,
  started: Instant,
  base: f64,
  synergy: f64,
  conditional: f64,
  relic_base: Vec<f64>,
  relic_conditional: Vec<f64>,
  effects: Vec<EffectContribution>,
  effects_evaluated: usize,
}

impl<'a> Estimate<'a> {
  fn new(relics: &'a [Relic], tier: CalculationTier) -> Self {
    Self {
      relics,
      tier,
      started: Instant::now(),
      base: 0.0,
      synergy: 0.0,
      conditional: 0.0,
      relic_base: vec![0.0; relics.len()],
      relic_conditional: vec![0.0; relics.len()],
      effects: Vec::new(),
      effects_evaluated: 0,
    }
  }

  fn add_base(&mut self, index: usize, value: f64) {
    self.relic_base[index] += value;
    self.base += value;
  }

  fn raw_total(&self) -> f64 {
    self.base + self.synergy + self.conditional
  }

  fn ensure_finite(self) -> Result<Self> {
    let total = self.raw_total();
    if total.is_finite() {
      Ok(self)
    } else {
      Err(Error::phase(
        "assembly",
        format!("{} tier produced non-finite total {}", self.tier, total),
      ))
    }
  }

  /// Clamp, round and tag as an offline result.
  ///
  /// Components that overflowed saturate at `f64::MAX`.
  pub fn into_result(self, cache_key: String, bounds: Bounds) -> CalculationResult {
    let p = bounds.precision;
    let round = |value: f64| round_to(saturate(value), p);
    let raw = self.raw_total();
    let total = if raw.is_nan() {
      0.0
    } else {
      round_to(raw.clamp(0.0, bounds.hard_cap), p)
    };
    let difficulty = average_difficulty(self.relics);
    let efficiency = if difficulty > 0.0 {
      round_to(total / difficulty, p)
    } else {
      0.0
    };

    let relic_breakdown = self
      .relics
      .iter()
      .enumerate()
      .map(|(i, relic)| RelicContribution {
        relic_id: relic.id.clone(),
        name: relic.name.clone(),
        base: round(self.relic_base[i]),
        conditional: round(self.relic_conditional[i]),
        total: round(self.relic_base[i] + self.relic_conditional[i]),
      })
      .collect();

    CalculationResult {
      base: round(self.base),
      synergy: round(self.synergy),
      conditional: round(self.conditional),
      environmental: 0.0,
      total,
      efficiency,
      average_difficulty: round_to(difficulty, p),
      penalties: Vec::new(),
      relic_breakdown,
      effect_breakdown: self.effects,
      trace: None,
      metadata: ResultMetadata {
        calculated_at: Utc::now(),
        cache_key,
        duration_ms: self.started.elapsed().as_secs_f64() * 1000.0,
        effects_evaluated: self.effects_evaluated,
        tier: self.tier,
        offline: true,
      },
    }
  }
}

fn saturate(value: f64) -> f64 {
  if value.is_nan() {
    0.0
  } else {
    value.clamp(f64::MIN, f64::MAX)
  }
}

/// Base multipliers only.
pub(crate) fn basic(relics: &[Relic]) -> Result<Estimate<'_>> {
  let mut estimate = Estimate::new(relics, CalculationTier::Basic);
  for (i, relic) in relics.iter().enumerate() {
    estimate.add_base(i, relic.base_multiplier());
  }
  estimate.ensure_finite()
}

/// Base multipliers, flat category pairs and the simple conditions.
///
/// Effects gated on anything other than enemy type or health are skipped.
pub(crate) fn intermediate<'a>(
  relics: &'a [Relic],
  runtime: &RuntimeConditions,
) -> Result<Estimate<'a>> {
  let mut estimate = Estimate::new(relics, CalculationTier::Intermediate);

  let mut categories: BTreeMap<RelicCategory, usize> = BTreeMap::new();
  for (i, relic) in relics.iter().enumerate() {
    estimate.add_base(i, relic.base_multiplier());
    *categories.entry(relic.category).or_insert(0) += 1;
  }
  estimate.synergy = categories
    .values()
    .map(|&n| PAIR_BONUS * (n * n.saturating_sub(1)) as f64 / 2.0)
    .sum();

  for (i, relic) in relics.iter().enumerate() {
    for effect in &relic.effects {
      estimate.effects_evaluated += 1;
      let simple = effect.conditions.iter().all(|c| c.is_simple());
      if !simple || !effect.is_active(runtime) {
        continue;
      }
      let contribution = CONDITIONAL_SHARE * effect.value * effect.effect_type.condition_scaling();
      estimate.conditional += contribution;
      estimate.relic_conditional[i] += contribution;
      estimate.effects.push(EffectContribution {
        relic_id: relic.id.clone(),
        effect_type: effect.effect_type,
        value: effect.value,
        stacking_multiplier: CONDITIONAL_SHARE,
        contribution,
      });
    }
  }

  estimate.ensure_finite()
}

/// Rarity-table estimate. Never fails.
pub(crate) fn fallback(relics: &[Relic]) -> Estimate<'_> {
  let mut estimate = Estimate::new(relics, CalculationTier::Fallback);
  for (i, relic) in relics.iter().enumerate() {
    let value = relic.attack_multiplier.unwrap_or_else(|| {
      relic.rarity.estimated_multiplier() + EFFECT_INCREMENT * relic.effects.len() as f64
    });
    estimate.add_base(i, value);
  }
  estimate
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::relic::{Condition, Effect, EffectType, Rarity};

  const BOUNDS: Bounds = Bounds {
    precision: 2,
    hard_cap: 10.0,
  };

  fn relics() -> Vec<Relic> {
    vec![
      Relic::new("r1", RelicCategory::Weapon, 1.25),
      Relic::new("r2", RelicCategory::Weapon, 1.10)
        .with_effect(
          Effect::new(EffectType::ConditionalDamage, 20.0).when(Condition::enemy("boss")),
        )
        .with_effect(
          Effect::new(EffectType::AttackPercentage, 10.0).when(Condition::MinCombo { count: 1 }),
        ),
    ]
  }

  #[test]
  fn test_basic_has_no_bonuses() {
    let relics = relics();
    let result = basic(&relics).unwrap().into_result("k".into(), BOUNDS);
    assert_eq!(result.base, 2.35);
    assert_eq!(result.synergy, 0.0);
    assert_eq!(result.conditional, 0.0);
    assert_eq!(result.total, 2.35);
    assert_eq!(result.metadata.tier, CalculationTier::Basic);
    assert!(result.metadata.offline);
  }

  #[test]
  fn test_intermediate_simple_conditions_only() {
    let relics = relics();
    let runtime = RuntimeConditions {
      combo_count: 5,
      ..RuntimeConditions::against("boss")
    };
    let result = intermediate(&relics, &runtime)
      .unwrap()
      .into_result("k".into(), BOUNDS);
    assert_eq!(result.synergy, 0.1);
    // 0.5 × 20 × 0.01; the combo-gated effect is skipped.
    assert_eq!(result.conditional, 0.1);
    assert_eq!(result.total, 2.55);
    assert_eq!(result.effect_breakdown.len(), 1);
  }

  #[test]
  fn test_fallback_uses_rarity_when_multiplier_unknown() {
    let mut unknown = Relic::new("r3", RelicCategory::Artifact, 0.0)
      .with_rarity(Rarity::Epic)
      .with_effect(Effect::new(EffectType::AttackFlat, 5.0))
      .with_effect(Effect::new(EffectType::AttackFlat, 5.0));
    unknown.attack_multiplier = None;
    let relics = vec![Relic::new("r1", RelicCategory::Weapon, 1.25), unknown];

    let result = fallback(&relics).into_result("k".into(), BOUNDS);
    // 1.25 + 1.35 + 2 × 0.05
    assert_eq!(result.total, 2.7);
    assert_eq!(result.metadata.tier, CalculationTier::Fallback);
  }

  #[test]
  fn test_results_are_clamped() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, 8.0),
      Relic::new("b", RelicCategory::Armor, 8.0),
    ];
    let result = basic(&relics).unwrap().into_result("k".into(), BOUNDS);
    assert_eq!(result.total, 10.0);
    assert_eq!(result.base, 16.0);

    let negative = vec![Relic::new("c", RelicCategory::Weapon, -3.0)];
    let result = fallback(&negative).into_result("k".into(), BOUNDS);
    assert_eq!(result.total, 0.0);
  }

  #[test]
  fn test_fallback_overflow_saturates() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, f64::MAX),
      Relic::new("b", RelicCategory::Armor, f64::MAX),
    ];
    let result = fallback(&relics).into_result("k".into(), BOUNDS);
    assert!(result.is_finite());
    assert_eq!(result.base, f64::MAX);
    assert_eq!(result.total, 10.0);
    assert!(result.relic_breakdown.iter().all(|r| r.total.is_finite()));
    assert!(!serde_json::to_string(&result).unwrap().contains("null"));
  }

  #[test]
  fn test_overflow_is_an_error() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, f64::MAX),
      Relic::new("b", RelicCategory::Armor, f64::MAX),
    ];
    assert!(matches!(
      basic(&relics),
      Err(Error::CalculationFailure { .. })
    ));
  }
}
