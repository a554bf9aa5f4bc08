use futures::future::BoxFuture;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{parse_catalog, RelicSource};
use crate::error::{Error, Result};
use crate::relic::Relic;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Catalog served over HTTP as a JSON array at `<base>/relics`.
#[derive(Clone)]
pub struct HttpRelicSource {
  client: reqwest::Client,
  endpoint: Url,
}

impl HttpRelicSource {
  pub fn new(base_url: &str) -> Result<Self> {
    let endpoint = catalog_endpoint(base_url)?;
    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .build()
      .map_err(|e| Error::Sync(format!("failed to build HTTP client: {}", e)))?;
    Ok(Self { client, endpoint })
  }

  pub fn endpoint(&self) -> &Url {
    &self.endpoint
  }

  async fn fetch(&self) -> Result<Vec<Relic>> {
    debug!(url = %self.endpoint, "fetching relic catalog");
    let response = self
      .client
      .get(self.endpoint.clone())
      .header(reqwest::header::ACCEPT, "application/json")
      .send()
      .await
      .map_err(|e| Error::Sync(format!("request to {} failed: {}", self.endpoint, e)))?;

    let status = response.status();
    if !status.is_success() {
      return Err(Error::Sync(format!(
        "catalog request to {} returned {}",
        self.endpoint, status
      )));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| Error::Sync(format!("failed to read catalog body: {}", e)))?;
    parse_catalog(&body)
  }
}

impl RelicSource for HttpRelicSource {
  fn fetch_all(&self) -> BoxFuture<'_, Result<Vec<Relic>>> {
    Box::pin(self.fetch())
  }
}

/// Resolve `<base>/relics`, keeping any path prefix on the base.
fn catalog_endpoint(base_url: &str) -> Result<Url> {
  let mut base = Url::parse(base_url)
    .map_err(|e| Error::Validation(format!("invalid catalog URL {:?}: {}", base_url, e)))?;
  if !matches!(base.scheme(), "http" | "https") {
    return Err(Error::Validation(format!(
      "catalog URL must be http or https, got {}",
      base.scheme()
    )));
  }
  if !base.path().ends_with('/') {
    let path = format!("{}/", base.path());
    base.set_path(&path);
  }
  base
    .join("relics")
    .map_err(|e| Error::Validation(format!("invalid catalog URL {:?}: {}", base_url, e)))
}
