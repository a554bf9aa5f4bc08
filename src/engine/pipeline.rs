//! The six calculation phases.
//!
//! Phases run strictly in order; each reads the totals the previous one left
//! in [`CalculationState`]. Stacking (conditional phase) is applied before the
//! global diminishing-returns penalty (interaction phase).

use std::collections::BTreeMap;

use super::config::EngineConfig;
use super::hooks::Hooks;
use super::result::{
  round_to, CalculationResult, EffectContribution, Penalty, Phase, RelicContribution,
  ResultMetadata,
};
use super::state::CalculationState;
use crate::error::{Error, Result};
use crate::relic::{EffectType, Relic, RelicCategory, StackingRule};

pub(crate) struct Pipeline<'e> {
  pub config: &'e EngineConfig,
  pub hooks: &'e Hooks,
  /// Maximum effect evaluations in the conditional phase
  pub budget: Option<usize>,
}

impl Pipeline<'_> {
  pub fn run(&self, state: &mut CalculationState<'_>) -> Result<()> {
    self.base(state)?;
    self.synergy(state)?;
    self.conditional(state)?;
    self.environmental(state)?;
    self.interactions(state)
  }

  fn base(&self, state: &mut CalculationState<'_>) -> Result<()> {
    let relics = state.relics;
    for (i, relic) in relics.iter().enumerate() {
      let intrinsic: f64 = self.hooks.relic_bonuses.iter().map(|b| b.score(relic)).sum();
      let value = relic.base_multiplier() + intrinsic;
      state.relic_base[i] = value;
      state.base += value;
    }
    ensure_finite(Phase::Base, state.base)?;
    let base = state.base;
    state.step(Phase::Base, || format!("base multipliers sum to {:.4}", base));
    Ok(())
  }

  fn synergy(&self, state: &mut CalculationState<'_>) -> Result<()> {
    let type_bonus = category_synergy(state.relics, self.config.type_synergy);
    state.synergy += type_bonus;
    state.step(Phase::Synergy, || format!("type synergy {:.4}", type_bonus));

    let effect_bonus = effect_type_synergy(state.relics);
    state.synergy += effect_bonus;
    state.step(Phase::Synergy, || format!("effect synergy {:.4}", effect_bonus));

    for set in &self.config.sets {
      let owned = state
        .relics
        .iter()
        .filter(|r| r.set_id.as_deref() == Some(set.id.as_str()))
        .count();
      let bonus = set.bonus_for(owned);
      if bonus > 0.0 {
        state.synergy += bonus;
        state.step(Phase::Synergy, || {
          format!("set {} ({} pieces) {:.4}", set.id, owned, bonus)
        });
      }
    }

    for rule in &self.hooks.patterns {
      if let Some(score) = rule.evaluate(state.relics) {
        state.synergy += score;
        state.step(Phase::Synergy, || format!("pattern {} {:.4}", rule.name, score));
      }
    }

    ensure_finite(Phase::Synergy, state.synergy)
  }

  fn conditional(&self, state: &mut CalculationState<'_>) -> Result<()> {
    let relics = state.relics;
    for (i, relic) in relics.iter().enumerate() {
      for effect in &relic.effects {
        state.effects_evaluated += 1;
        if let Some(budget) = self.budget {
          if state.effects_evaluated > budget {
            return Err(Error::phase(
              Phase::Conditional.as_str(),
              format!("complexity budget of {} effects exceeded", budget),
            ));
          }
        }

        if !effect.is_active(state.runtime) {
          continue;
        }

        let prior = state
          .stack_counts
          .get(&effect.effect_type)
          .copied()
          .unwrap_or(0);
        let stacking_multiplier = self.stacking_multiplier(effect.stacking, prior);
        let contribution =
          effect.value * effect.effect_type.condition_scaling() * stacking_multiplier;

        state.conditional += contribution;
        state.relic_conditional[i] += contribution;
        *state.stack_counts.entry(effect.effect_type).or_insert(0) += 1;
        state.active_effects.push(EffectContribution {
          relic_id: relic.id.clone(),
          effect_type: effect.effect_type,
          value: effect.value,
          stacking_multiplier,
          contribution,
        });
      }
    }

    ensure_finite(Phase::Conditional, state.conditional)?;
    let (active, conditional) = (state.active_effects.len(), state.conditional);
    state.step(Phase::Conditional, || {
      format!("{} active effects contribute {:.4}", active, conditional)
    });
    Ok(())
  }

  fn stacking_multiplier(&self, rule: StackingRule, prior: u32) -> f64 {
    match rule {
      StackingRule::Additive | StackingRule::Multiplicative => {
        1.0 + prior as f64 * self.config.stacking_step
      }
      StackingRule::Overwrite => 1.0,
      StackingRule::Unique => {
        if prior == 0 {
          1.0
        } else {
          0.0
        }
      }
    }
  }

  fn environmental(&self, state: &mut CalculationState<'_>) -> Result<()> {
    let Some(context) = state.context else {
      return Ok(());
    };
    let bonuses = &self.config.environment;
    let mut total = 0.0;
    if context.is_night {
      total += bonuses.night;
    }
    total += context.seasonal_effects.len() as f64 * bonuses.seasonal;
    total += context.environment_bonuses.len() as f64 * bonuses.environment;

    state.environmental += total;
    ensure_finite(Phase::Environmental, state.environmental)?;
    state.step(Phase::Environmental, || format!("environment adds {:.4}", total));
    Ok(())
  }

  fn interactions(&self, state: &mut CalculationState<'_>) -> Result<()> {
    let core = state.base + state.synergy + state.conditional;
    if core > self.config.dr_threshold {
      let penalty = (core - self.config.dr_threshold) * self.config.dr_rate;
      state.add_penalty("diminishing_returns", penalty);
      state.step(Phase::Interactions, || {
        format!("diminishing returns penalty {:.4}", penalty)
      });
    }

    let full = state.components();
    if full > self.config.hard_cap {
      let penalty = full - self.config.hard_cap;
      state.add_penalty("hard_cap", penalty);
      state.step(Phase::Interactions, || format!("hard cap penalty {:.4}", penalty));
    }

    for rule in &self.hooks.negative_interactions {
      if let Some(score) = rule.evaluate(state.relics) {
        state.add_penalty(rule.name.clone(), score.max(0.0));
        state.step(Phase::Interactions, || {
          format!("negative interaction {} {:.4}", rule.name, score)
        });
      }
    }

    for rule in &self.hooks.special_combinations {
      if let Some(score) = rule.evaluate(state.relics) {
        state.synergy += score;
        state.step(Phase::Interactions, || {
          format!("special combination {} {:.4}", rule.name, score)
        });
      }
    }

    ensure_finite(Phase::Interactions, state.components() - state.penalty_total())
  }

  /// Final phase: clamp, round and build the breakdowns.
  pub fn assemble(
    &self,
    state: &mut CalculationState<'_>,
    metadata: ResultMetadata,
    precision: u32,
  ) -> CalculationResult {
    let raw_total = state.components() - state.penalty_total();
    let total = round_to(raw_total.clamp(0.0, self.config.hard_cap), precision);
    state.step(Phase::Assembly, || format!("assembled total {:.4}", total));

    let average_difficulty = average_difficulty(state.relics);
    let efficiency = if average_difficulty > 0.0 {
      round_to(total / average_difficulty, precision)
    } else {
      0.0
    };

    let relic_breakdown = state
      .relics
      .iter()
      .enumerate()
      .map(|(i, relic)| RelicContribution {
        relic_id: relic.id.clone(),
        name: relic.name.clone(),
        base: round_to(state.relic_base[i], precision),
        conditional: round_to(state.relic_conditional[i], precision),
        total: round_to(state.relic_base[i] + state.relic_conditional[i], precision),
      })
      .collect();

    let effect_breakdown = state
      .active_effects
      .iter()
      .map(|e| EffectContribution {
        contribution: round_to(e.contribution, precision),
        ..e.clone()
      })
      .collect();

    let penalties = state
      .penalties
      .iter()
      .map(|p| Penalty {
        reason: p.reason.clone(),
        amount: round_to(p.amount, precision),
      })
      .collect();

    CalculationResult {
      base: round_to(state.base, precision),
      synergy: round_to(state.synergy, precision),
      conditional: round_to(state.conditional, precision),
      environmental: round_to(state.environmental, precision),
      total,
      efficiency,
      average_difficulty: round_to(average_difficulty, precision),
      penalties,
      relic_breakdown,
      effect_breakdown,
      trace: state.take_trace(),
      metadata,
    }
  }
}

/// `per_pair × n(n−1)/2` for every category held at least twice.
pub fn category_synergy(relics: &[Relic], per_pair: f64) -> f64 {
  let mut counts: BTreeMap<RelicCategory, usize> = BTreeMap::new();
  for relic in relics {
    *counts.entry(relic.category).or_insert(0) += 1;
  }
  counts
    .values()
    .filter(|&&n| n >= 2)
    .map(|&n| per_pair * pairs(n))
    .sum()
}

/// Pairwise bonus for relics sharing an effect type.
/// A relic counts once per type however many such effects it carries.
pub fn effect_type_synergy(relics: &[Relic]) -> f64 {
  let mut counts: BTreeMap<EffectType, usize> = BTreeMap::new();
  for relic in relics {
    let mut seen: Vec<EffectType> = relic.effects.iter().map(|e| e.effect_type).collect();
    seen.sort_unstable();
    seen.dedup();
    for effect_type in seen {
      *counts.entry(effect_type).or_insert(0) += 1;
    }
  }
  counts
    .iter()
    .filter(|&(_, &n)| n >= 2)
    .map(|(effect_type, &n)| effect_type.synergy_scaling() * pairs(n))
    .sum()
}

pub fn average_difficulty(relics: &[Relic]) -> f64 {
  if relics.is_empty() {
    return 0.0;
  }
  relics
    .iter()
    .map(|r| f64::from(r.obtainment_difficulty))
    .sum::<f64>()
    / relics.len() as f64
}

fn pairs(n: usize) -> f64 {
  (n * n.saturating_sub(1)) as f64 / 2.0
}

fn ensure_finite(phase: Phase, value: f64) -> Result<()> {
  if value.is_finite() {
    Ok(())
  } else {
    Err(Error::phase(phase.as_str(), format!("non-finite total {}", value)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::relic::{Effect, RelicCategory};

  #[test]
  fn test_category_synergy_pairs() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, 1.0),
      Relic::new("b", RelicCategory::Weapon, 1.0),
      Relic::new("c", RelicCategory::Weapon, 1.0),
      Relic::new("d", RelicCategory::Armor, 1.0),
    ];
    // Three weapons make three pairs.
    assert!((category_synergy(&relics, 0.15) - 0.45).abs() < 1e-9);
  }

  #[test]
  fn test_effect_synergy_counts_relics_once() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, 1.0)
        .with_effect(Effect::new(EffectType::AttackFlat, 10.0))
        .with_effect(Effect::new(EffectType::AttackFlat, 10.0)),
      Relic::new("b", RelicCategory::Armor, 1.0)
        .with_effect(Effect::new(EffectType::AttackFlat, 5.0)),
    ];
    assert!((effect_type_synergy(&relics) - 0.06).abs() < 1e-9);
    assert_eq!(effect_type_synergy(&relics[..1]), 0.0);
  }

  #[test]
  fn test_average_difficulty() {
    let relics = vec![
      Relic::new("a", RelicCategory::Weapon, 1.0).with_difficulty(2),
      Relic::new("b", RelicCategory::Weapon, 1.0).with_difficulty(6),
    ];
    assert_eq!(average_difficulty(&relics), 4.0);
    assert_eq!(average_difficulty(&[]), 0.0);
  }
}
