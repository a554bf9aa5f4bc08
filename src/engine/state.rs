//! Per-invocation accumulator threaded through the pipeline phases.

use std::collections::BTreeMap;

use super::result::{EffectContribution, Penalty, Phase, TraceStep};
use crate::relic::{CalculationContext, EffectType, Relic, RuntimeConditions};

/// Running totals for one `calculate` call. Never shared between calls.
pub struct CalculationState<'a> {
  pub relics: &'a [Relic],
  pub runtime: &'a RuntimeConditions,
  pub context: Option<&'a CalculationContext>,

  pub base: f64,
  pub synergy: f64,
  pub conditional: f64,
  pub environmental: f64,

  pub active_effects: Vec<EffectContribution>,
  pub stack_counts: BTreeMap<EffectType, u32>,
  pub penalties: Vec<Penalty>,
  pub effects_evaluated: usize,

  pub(crate) relic_base: Vec<f64>,
  pub(crate) relic_conditional: Vec<f64>,
  trace: Option<Vec<TraceStep>>,
}

impl<'a> CalculationState<'a> {
  pub fn new(
    relics: &'a [Relic],
    runtime: &'a RuntimeConditions,
    context: Option<&'a CalculationContext>,
    debug: bool,
  ) -> Self {
    Self {
      relics,
      runtime,
      context,
      base: 0.0,
      synergy: 0.0,
      conditional: 0.0,
      environmental: 0.0,
      active_effects: Vec::new(),
      stack_counts: BTreeMap::new(),
      penalties: Vec::new(),
      effects_evaluated: 0,
      relic_base: vec![0.0; relics.len()],
      relic_conditional: vec![0.0; relics.len()],
      trace: debug.then(Vec::new),
    }
  }

  /// Sum of all four components before penalties.
  pub fn components(&self) -> f64 {
    self.base + self.synergy + self.conditional + self.environmental
  }

  pub fn penalty_total(&self) -> f64 {
    self.penalties.iter().map(|p| p.amount).sum()
  }

  pub fn add_penalty(&mut self, reason: impl Into<String>, amount: f64) {
    self.penalties.push(Penalty {
      reason: reason.into(),
      amount,
    });
  }

  /// Record a trace step when tracing is enabled.
  pub fn step(&mut self, phase: Phase, description: impl FnOnce() -> String) {
    let running_total = self.components() - self.penalty_total();
    if let Some(trace) = self.trace.as_mut() {
      trace.push(TraceStep {
        phase,
        description: description(),
        running_total,
      });
    }
  }

  pub(crate) fn take_trace(&mut self) -> Option<Vec<TraceStep>> {
    self.trace.take()
  }
}
