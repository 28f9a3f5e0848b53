//! Error kinds surfaced by the offline engine.

use thiserror::Error;

/// The remote service could not be reached at all (DNS, connect, timeout, body read).
///
/// From the engine's point of view every one of these means "offline".
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TransportError {
  message: String,
  #[source]
  source: Option<reqwest::Error>,
}

impl TransportError {
  pub fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
      source: None,
    }
  }

  pub fn message(&self) -> &str {
    &self.message
  }
}

impl From<reqwest::Error> for TransportError {
  fn from(err: reqwest::Error) -> Self {
    let kind = if err.is_timeout() {
      "timed out"
    } else if err.is_connect() {
      "connection failed"
    } else {
      "request failed"
    };

    Self {
      message: format!("{}: {}", kind, err),
      source: Some(err),
    }
  }
}

#[derive(Debug, Error)]
pub enum EngineError {
  /// Network attempt did not complete.
  #[error("remote unreachable: {0}")]
  TransportUnreachable(#[from] TransportError),

  /// Remote answered with a non-success status.
  #[error("server error: {status} {status_text}")]
  RemoteRejected { status: u16, status_text: String },

  /// Nothing stored under this key in the active namespace.
  #[error("no cached response for {key}")]
  CacheMiss { key: String },

  /// Offline and no fallback strategy could answer the request.
  #[error("Not available: {request}")]
  NotAvailable { request: String },

  /// One or more queued todos failed to replay; the queue was left intact.
  #[error("sync pass incomplete: {failed} of {total} queued todos failed to replay")]
  SyncPassIncomplete { failed: usize, total: usize },

  #[error("a sync pass is already in flight")]
  SyncInFlight,

  /// Seeding the cache namespace failed; nothing was committed.
  #[error("cache bootstrap failed for {key}: {reason}")]
  Bootstrap { key: String, reason: String },

  #[error("storage error: {0}")]
  Storage(#[from] rusqlite::Error),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),

  #[error("malformed payload: {0}")]
  Payload(#[from] serde_json::Error),

  #[error("bad stored timestamp: {0}")]
  Timestamp(#[from] chrono::ParseError),

  #[error("lock poisoned")]
  LockPoisoned,

  #[error("sync scheduler has shut down")]
  Shutdown,
}

impl EngineError {
  /// True for the errors that mean "could not reach the remote".
  pub fn is_offline(&self) -> bool {
    matches!(self, EngineError::TransportUnreachable(_))
  }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
