use futures::future::BoxFuture;
use std::path::{Path, PathBuf};

use super::{parse_catalog, RelicSource};
use crate::error::{Error, Result};
use crate::relic::Relic;

/// JSON catalog on the local filesystem, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FileRelicSource {
  path: PathBuf,
}

impl FileRelicSource {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  async fn read(&self) -> Result<Vec<Relic>> {
    let bytes = tokio::fs::read(&self.path)
      .await
      .map_err(|e| Error::Sync(format!("failed to read {}: {}", self.path.display(), e)))?;
    parse_catalog(&bytes)
  }
}

impl RelicSource for FileRelicSource {
  fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Relic>>> {
    Box::pin(self.read())
  }
}
