//! Authoritative relic catalog sources consumed by offline sync.

mod file;
mod http;

pub use file::FileRelicSource;
pub use http::HttpRelicSource;

use futures::future::BoxFuture;

use crate::error::{Error, Result};
use crate::relic::Relic;

/// Fetches the full relic catalog.
pub trait RelicSource: Send + Sync {
  fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Relic>>>;
}

/// Fixed in-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticRelicSource {
  relics: Vec<Relic>,
}

impl StaticRelicSource {
  pub fn new(relics: Vec<Relic>) -> Self {
    Self { relics }
  }
}

impl RelicSource for StaticRelicSource {
  fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Relic>>> {
    let relics = self.relics.clone();
    Box::pin(async move { Ok(relics) })
  }
}

/// Parse a JSON catalog array. One invalid relic rejects the whole catalog.
pub(crate) fn parse_catalog(bytes: &[u8]) -> Result<Vec<Relic>> {
  let relics: Vec<Relic> = serde_json::from_slice(bytes)?;
  for relic in &relics {
    relic
      .validate()
      .map_err(|e| Error::Sync(format!("invalid relic {:?}: {}", relic.id, e)))?;
  }
  Ok(relics)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_catalog() {
    let json = br#"[
      {"id": "r1", "name": "Fang", "category": "weapon", "rarity": "rare", "attack_multiplier": 1.25},
      {"id": "r2", "category": "armor", "effects": [{"type": "attack_flat", "value": 10}]}
    ]"#;
    let relics = parse_catalog(json).unwrap();
    assert_eq!(relics.len(), 2);
    assert_eq!(relics[0].attack_multiplier, Some(1.25));
    assert_eq!(relics[1].attack_multiplier, None);
    assert_eq!(relics[1].effects.len(), 1);
  }

  #[test]
  fn test_parse_catalog_rejects_invalid_relic() {
    let json = br#"[{"id": "", "category": "weapon"}]"#;
    assert!(matches!(parse_catalog(json), Err(Error::Sync(_))));
  }

  #[test]
  fn test_parse_catalog_rejects_garbage() {
    assert!(matches!(
      parse_catalog(b"not json"),
      Err(Error::Serialization(_))
    ));
  }

  #[tokio::test]
  async fn test_static_source() {
    let source = StaticRelicSource::new(vec![Relic::new(
      "r1",
      crate::relic::RelicCategory::Weapon,
      1.0,
    )]);
    assert_eq!(source.fetch_all().await.unwrap().len(), 1);
  }
}
