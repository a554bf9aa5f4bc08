//! Relic catalog types and per-call runtime inputs.

use serde::{Deserialize, Serialize};

/// Relic category. Relics sharing a category earn type synergy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelicCategory {
  Weapon,
  Armor,
  Accessory,
  Artifact,
  Consumable,
  #[serde(other)]
  Misc,
}

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
  #[default]
  Common,
  Uncommon,
  Rare,
  Epic,
  Legendary,
  Mythic,
}

impl Rarity {
  /// Estimated multiplier used when a relic carries no multiplier of its own.
  pub fn estimated_multiplier(self) -> f64 {
    match self {
      Rarity::Common => 1.05,
      Rarity::Uncommon => 1.1,
      Rarity::Rare => 1.2,
      Rarity::Epic => 1.35,
      Rarity::Legendary => 1.5,
      Rarity::Mythic => 1.75,
    }
  }
}

/// A game item contributing a base multiplier and zero or more effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relic {
  pub id: String,
  #[serde(default)]
  pub name: String,
  pub category: RelicCategory,
  #[serde(default)]
  pub rarity: Rarity,
  /// Base contribution; `None` when the catalog does not know it.
  #[serde(default)]
  pub attack_multiplier: Option<f64>,
  /// 1 (trivial) to 10 (hardest)
  #[serde(default = "default_difficulty")]
  pub obtainment_difficulty: u8,
  #[serde(default)]
  pub set_id: Option<String>,
  #[serde(default)]
  pub effects: Vec<Effect>,
}

fn default_difficulty() -> u8 {
  1
}

impl Relic {
  pub fn new(id: impl Into<String>, category: RelicCategory, attack_multiplier: f64) -> Self {
    let id = id.into();
    Self {
      name: id.clone(),
      id,
      category,
      rarity: Rarity::Common,
      attack_multiplier: Some(attack_multiplier),
      obtainment_difficulty: 1,
      set_id: None,
      effects: Vec::new(),
    }
  }

  pub fn with_rarity(mut self, rarity: Rarity) -> Self {
    self.rarity = rarity;
    self
  }

  pub fn with_difficulty(mut self, difficulty: u8) -> Self {
    self.obtainment_difficulty = difficulty;
    self
  }

  pub fn with_set(mut self, set_id: impl Into<String>) -> Self {
    self.set_id = Some(set_id.into());
    self
  }

  pub fn with_effect(mut self, effect: Effect) -> Self {
    self.effects.push(effect);
    self
  }

  /// Base multiplier, treating an unknown value as zero.
  pub fn base_multiplier(&self) -> f64 {
    self.attack_multiplier.unwrap_or(0.0)
  }

  /// Check that the relic is well formed enough to calculate with.
  pub fn validate(&self) -> Result<(), String> {
    if self.id.trim().is_empty() {
      return Err("relic id must not be empty".to_string());
    }
    if let Some(m) = self.attack_multiplier {
      if !m.is_finite() {
        return Err(format!("relic {} has a non-finite multiplier", self.id));
      }
    }
    if !(1..=10).contains(&self.obtainment_difficulty) {
      return Err(format!(
        "relic {} has obtainment difficulty {} outside 1..=10",
        self.id, self.obtainment_difficulty
      ));
    }
    for effect in &self.effects {
      if !effect.value.is_finite() {
        return Err(format!("relic {} has a non-finite effect value", self.id));
      }
    }
    Ok(())
  }
}

/// Kind of bonus an effect grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectType {
  AttackMultiplier,
  AttackPercentage,
  AttackFlat,
  CriticalMultiplier,
  ElementalDamage,
  ConditionalDamage,
  #[serde(other)]
  Other,
}

impl EffectType {
  /// Factor converting an effect value into multiplier units.
  pub fn condition_scaling(self) -> f64 {
    match self {
      EffectType::AttackMultiplier => 1.0,
      EffectType::CriticalMultiplier => 0.5,
      EffectType::AttackFlat => 0.001,
      EffectType::AttackPercentage
      | EffectType::ElementalDamage
      | EffectType::ConditionalDamage
      | EffectType::Other => 0.01,
    }
  }

  /// Pairwise synergy bonus when several relics carry this effect type.
  pub fn synergy_scaling(self) -> f64 {
    match self {
      EffectType::AttackMultiplier => 0.15,
      EffectType::CriticalMultiplier => 0.12,
      EffectType::AttackPercentage | EffectType::ConditionalDamage => 0.1,
      EffectType::ElementalDamage => 0.08,
      EffectType::AttackFlat | EffectType::Other => 0.06,
    }
  }
}

/// Policy for combining repeated activations of one effect type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingRule {
  #[default]
  Additive,
  Multiplicative,
  Overwrite,
  Unique,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
  #[serde(rename = "type")]
  pub effect_type: EffectType,
  #[serde(default)]
  pub stacking: StackingRule,
  pub value: f64,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub conditions: Vec<Condition>,
}

impl Effect {
  pub fn new(effect_type: EffectType, value: f64) -> Self {
    Self {
      effect_type,
      stacking: StackingRule::Additive,
      value,
      conditions: Vec::new(),
    }
  }

  pub fn with_stacking(mut self, stacking: StackingRule) -> Self {
    self.stacking = stacking;
    self
  }

  pub fn when(mut self, condition: Condition) -> Self {
    self.conditions.push(condition);
    self
  }

  /// An effect is active iff every attached condition passes.
  pub fn is_active(&self, runtime: &RuntimeConditions) -> bool {
    self.conditions.iter().all(|c| c.passes(runtime))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthDirection {
  Above,
  Below,
}

/// Shape of the input a condition is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionKind {
  Boolean,
  Numeric,
  Select,
  Multiselect,
}

/// Activation condition attached to an effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
  EnemyType { enemy: String },
  Health { threshold: f64, direction: HealthDirection },
  MinCombo { count: u32 },
  FirstHit,
  Environment { any_of: Vec<String> },
}

impl Condition {
  pub fn enemy(enemy: impl Into<String>) -> Self {
    Condition::EnemyType {
      enemy: enemy.into(),
    }
  }

  pub fn kind(&self) -> ConditionKind {
    match self {
      Condition::FirstHit => ConditionKind::Boolean,
      Condition::Health { .. } | Condition::MinCombo { .. } => ConditionKind::Numeric,
      Condition::EnemyType { .. } => ConditionKind::Select,
      Condition::Environment { .. } => ConditionKind::Multiselect,
    }
  }

  /// Evaluate against the caller's runtime state. Missing runtime input fails.
  pub fn passes(&self, runtime: &RuntimeConditions) -> bool {
    match self {
      Condition::EnemyType { enemy } => runtime.enemy_type.as_deref() == Some(enemy.as_str()),
      Condition::Health {
        threshold,
        direction,
      } => match (runtime.player_health, direction) {
        (Some(health), HealthDirection::Above) => health > *threshold,
        (Some(health), HealthDirection::Below) => health < *threshold,
        (None, _) => false,
      },
      Condition::MinCombo { count } => runtime.combo_count >= *count,
      Condition::FirstHit => runtime.is_first_hit,
      Condition::Environment { any_of } => any_of
        .iter()
        .any(|tag| runtime.environments.iter().any(|active| active == tag)),
    }
  }

  /// Whether this condition is one the intermediate offline tier evaluates.
  pub fn is_simple(&self) -> bool {
    matches!(self, Condition::EnemyType { .. } | Condition::Health { .. })
  }
}

/// Per-invocation combat state supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConditions {
  #[serde(default)]
  pub enemy_type: Option<String>,
  /// Player health percentage
  #[serde(default)]
  pub player_health: Option<f64>,
  #[serde(default)]
  pub combo_count: u32,
  #[serde(default)]
  pub is_first_hit: bool,
  #[serde(default)]
  pub environments: Vec<String>,
}

impl RuntimeConditions {
  pub fn against(enemy: impl Into<String>) -> Self {
    Self {
      enemy_type: Some(enemy.into()),
      ..Self::default()
    }
  }

  pub fn validate(&self) -> Result<(), String> {
    if let Some(health) = self.player_health {
      if !health.is_finite() {
        return Err("player health must be finite".to_string());
      }
    }
    Ok(())
  }
}

/// Environmental context for a calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationContext {
  #[serde(default)]
  pub is_night: bool,
  #[serde(default)]
  pub seasonal_effects: Vec<String>,
  #[serde(default)]
  pub environment_bonuses: Vec<String>,
}

/// Predefined relic set granting a bonus once enough pieces are owned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelicSet {
  pub id: String,
  pub name: String,
  pub min_pieces: usize,
  pub max_pieces: usize,
  pub bonus: f64,
}

impl RelicSet {
  /// Bonus for owning `owned` pieces: scaled by completion, zero below the minimum.
  pub fn bonus_for(&self, owned: usize) -> f64 {
    if owned == 0 || owned < self.min_pieces || self.max_pieces == 0 {
      return 0.0;
    }
    let completion = (owned as f64 / self.max_pieces as f64).min(1.0);
    self.bonus * completion
  }
}

/// Sets shipped with the calculator.
pub fn default_relic_sets() -> Vec<RelicSet> {
  vec![
    RelicSet {
      id: "dragon_hoard".to_string(),
      name: "Dragon's Hoard".to_string(),
      min_pieces: 2,
      max_pieces: 4,
      bonus: 0.4,
    },
    RelicSet {
      id: "moonlit_regalia".to_string(),
      name: "Moonlit Regalia".to_string(),
      min_pieces: 3,
      max_pieces: 5,
      bonus: 0.5,
    },
  ]
}
