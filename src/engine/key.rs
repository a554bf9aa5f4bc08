//! Deterministic cache keys for calculation inputs.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::relic::{CalculationContext, Relic, RuntimeConditions};

/// Derive the memoization key for a calculation.
///
/// Relic ids are sorted first so the key does not depend on input order.
/// `salt` carries options that change the output (precision, trace).
pub fn derive_key(
  relics: &[Relic],
  conditions: &RuntimeConditions,
  context: Option<&CalculationContext>,
  salt: &str,
) -> Result<String> {
  let mut ids: Vec<&str> = relics.iter().map(|r| r.id.as_str()).collect();
  ids.sort_unstable();

  let mut hasher = Sha256::new();
  hasher.update(ids.join("\u{1f}").as_bytes());
  hasher.update(b"|");
  hasher.update(serde_json::to_vec(conditions)?);
  hasher.update(b"|");
  hasher.update(serde_json::to_vec(&context)?);
  hasher.update(b"|");
  hasher.update(salt.as_bytes());

  Ok(format!("calc:{}", hex::encode(hasher.finalize())))
}
