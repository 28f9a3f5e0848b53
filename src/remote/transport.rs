//! HTTP-shaped request/response model and the transport seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::TransportError;

/// A logical request headed for the remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
  pub method: Method,
  /// Absolute path, e.g. `/todos` or `/todos/42`
  pub path: String,
  pub query: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl ApiRequest {
  pub fn new(method: Method, path: impl Into<String>) -> Self {
    Self {
      method,
      path: path.into(),
      query: Vec::new(),
      body: None,
    }
  }

  pub fn get(path: impl Into<String>) -> Self {
    Self::new(Method::GET, path)
  }

  pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
    self.query = query;
    self
  }

  pub fn with_json<T: Serialize>(mut self, body: &T) -> serde_json::Result<Self> {
    self.body = Some(serde_json::to_vec(body)?);
    Ok(self)
  }

  /// `METHOD /path?k=v&...` with query pairs in the order given.
  pub fn request_line(&self) -> String {
    if self.query.is_empty() {
      format!("{} {}", self.method, self.path)
    } else {
      let query = self
        .query
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
      format!("{} {}?{}", self.method, self.path, query)
    }
  }

  /// Stable cache key: SHA-256 of the request line.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.request_line().as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response from the remote, from the cache, or synthesized offline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
  pub status: u16,
  pub status_text: String,
  /// Lowercased header names
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl ApiResponse {
  pub fn new(status: u16, status_text: impl Into<String>, body: Vec<u8>) -> Self {
    Self {
      status,
      status_text: status_text.into(),
      headers: BTreeMap::new(),
      body,
    }
  }

  /// JSON response stamped with `content-type` and a `date` header.
  pub fn json(status: u16, status_text: &str, body: Vec<u8>, date: DateTime<Utc>) -> Self {
    Self::new(status, status_text, body)
      .with_header("content-type", "application/json")
      .with_header("date", &http_date(date))
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_ascii_lowercase(), value.to_string());
    self
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .get(&name.to_ascii_lowercase())
      .map(String::as_str)
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Parsed `date` header, if present and well-formed.
  pub fn date(&self) -> Option<DateTime<Utc>> {
    self
      .header("date")
      .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
      .map(|d| d.with_timezone(&Utc))
  }
}

/// Format a timestamp as an HTTP date (IMF-fixdate).
pub fn http_date(date: DateTime<Utc>) -> String {
  date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Something that can carry an `ApiRequest` to the remote service.
///
/// Implementations return `Ok` for every response the remote produced, whatever
/// its status, and `Err` only when the remote could not be reached.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError>;
}
