use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::RemoteConfig;
use crate::error::TransportError;

use super::transport::{ApiRequest, ApiResponse, Transport};

/// Todo service client over HTTP
#[derive(Clone)]
pub struct RemoteClient {
  client: reqwest::Client,
  base_url: Url,
}

impl RemoteClient {
  pub fn new(config: &RemoteConfig) -> color_eyre::Result<Self> {
    let mut base_url = Url::parse(&config.url)
      .map_err(|e| color_eyre::eyre::eyre!("Invalid remote url {}: {}", config.url, e))?;

    // Url::join replaces the last segment unless the path ends in '/'
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = config.timeout_secs {
      builder = builder.timeout(Duration::from_secs(secs));
    }

    let client = builder
      .build()
      .map_err(|e| color_eyre::eyre::eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
    let mut url = self
      .base_url
      .join(request.path.trim_start_matches('/'))
      .map_err(|e| TransportError::new(format!("bad path {}: {}", request.path, e)))?;

    if !request.query.is_empty() {
      url.query_pairs_mut().extend_pairs(request.query.iter());
    }

    Ok(url)
  }
}

#[async_trait]
impl Transport for RemoteClient {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
    let url = self.url_for(request)?;

    let mut builder = self.client.request(request.method.clone(), url);
    if let Some(body) = &request.body {
      builder = builder
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.clone());
    }

    let response = builder.send().await?;

    let status = response.status();
    let headers: BTreeMap<String, String> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await?.to_vec();

    Ok(ApiResponse {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or_default().to_string(),
      headers,
      body,
    })
  }
}
