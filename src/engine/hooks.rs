//! Extension rules evaluated by the pipeline.
//!
//! Every list is empty by default. An engine with no rules computes exactly
//! the built-in synergy and interaction math.

use std::fmt;
use std::sync::Arc;

use crate::relic::Relic;

type Matcher = Arc<dyn Fn(&[Relic]) -> bool + Send + Sync>;
type Scorer = Arc<dyn Fn(&[Relic]) -> f64 + Send + Sync>;
type RelicScorer = Arc<dyn Fn(&Relic) -> f64 + Send + Sync>;

/// A predicate over the whole relic list paired with a scorer.
#[derive(Clone)]
pub struct ComboRule {
  pub name: String,
  matcher: Matcher,
  scorer: Scorer,
}

impl ComboRule {
  pub fn new<M, S>(name: impl Into<String>, matcher: M, scorer: S) -> Self
  where
    M: Fn(&[Relic]) -> bool + Send + Sync + 'static,
    S: Fn(&[Relic]) -> f64 + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      matcher: Arc::new(matcher),
      scorer: Arc::new(scorer),
    }
  }

  /// Score if the rule matches.
  pub fn evaluate(&self, relics: &[Relic]) -> Option<f64> {
    (self.matcher)(relics).then(|| (self.scorer)(relics))
  }
}

impl fmt::Debug for ComboRule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ComboRule")
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

/// Bonus intrinsic to a single relic, added in the base phase.
#[derive(Clone)]
pub struct RelicBonus {
  pub name: String,
  scorer: RelicScorer,
}

impl RelicBonus {
  pub fn new<S>(name: impl Into<String>, scorer: S) -> Self
  where
    S: Fn(&Relic) -> f64 + Send + Sync + 'static,
  {
    Self {
      name: name.into(),
      scorer: Arc::new(scorer),
    }
  }

  pub fn score(&self, relic: &Relic) -> f64 {
    (self.scorer)(relic)
  }
}

impl fmt::Debug for RelicBonus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RelicBonus")
      .field("name", &self.name)
      .finish_non_exhaustive()
  }
}

/// Ordered rule lists consulted by the pipeline phases.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
  /// Base phase, per relic
  pub relic_bonuses: Vec<RelicBonus>,
  /// Synergy phase, added to synergy
  pub patterns: Vec<ComboRule>,
  /// Interaction phase, scored as penalties
  pub negative_interactions: Vec<ComboRule>,
  /// Interaction phase, added to synergy
  pub special_combinations: Vec<ComboRule>,
}

impl Hooks {
  pub fn is_empty(&self) -> bool {
    self.relic_bonuses.is_empty()
      && self.patterns.is_empty()
      && self.negative_interactions.is_empty()
      && self.special_combinations.is_empty()
  }

  pub fn with_relic_bonus(mut self, bonus: RelicBonus) -> Self {
    self.relic_bonuses.push(bonus);
    self
  }

  pub fn with_pattern(mut self, rule: ComboRule) -> Self {
    self.patterns.push(rule);
    self
  }

  pub fn with_negative_interaction(mut self, rule: ComboRule) -> Self {
    self.negative_interactions.push(rule);
    self
  }

  pub fn with_special_combination(mut self, rule: ComboRule) -> Self {
    self.special_combinations.push(rule);
    self
  }
}
