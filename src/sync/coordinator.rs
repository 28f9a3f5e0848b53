use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::interceptor::COLLECTION_PATH;
use crate::queue::MutationQueue;
use crate::remote::{ApiRequest, Transport};
use crate::todo::Todo;

/// Diagnostics about reconciliation passes. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
  pub in_flight: bool,
  pub last_attempted: Option<DateTime<Utc>>,
  pub last_succeeded: Option<DateTime<Utc>>,
  pub last_error: Option<String>,
}

/// Result of a successful pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
  /// Number of queued todos sent to the remote
  pub replayed: usize,
}

/// Replays queued inserts against the remote.
///
/// At most one pass runs at a time; a pass either clears the whole queue or
/// leaves it untouched.
pub struct SyncCoordinator {
  transport: Arc<dyn Transport>,
  queue: MutationQueue,
  in_flight: AtomicBool,
  state: Mutex<SyncState>,
}

/// Resets the in-flight flag when a pass ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.store(false, Ordering::Release);
  }
}

impl SyncCoordinator {
  pub fn new(transport: Arc<dyn Transport>, queue: MutationQueue) -> Self {
    Self {
      transport,
      queue,
      in_flight: AtomicBool::new(false),
      state: Mutex::new(SyncState::default()),
    }
  }

  pub fn state(&self) -> SyncState {
    let mut state = self
      .state
      .lock()
      .map(|s| s.clone())
      .unwrap_or_default();
    state.in_flight = self.in_flight.load(Ordering::Acquire);
    state
  }

  /// Run one reconciliation pass.
  ///
  /// Returns `SyncInFlight` without touching anything if another pass is
  /// running, and `SyncPassIncomplete` if any replay failed (queue kept).
  pub async fn attempt_sync(&self) -> Result<SyncOutcome> {
    if self
      .in_flight
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      debug!("sync already in flight, rejecting");
      return Err(EngineError::SyncInFlight);
    }
    let _in_flight = InFlight(&self.in_flight);

    self.record(|s| s.last_attempted = Some(Utc::now()));

    let result = self.run_pass().await;

    match &result {
      Ok(_) => self.record(|s| {
        s.last_succeeded = Some(Utc::now());
        s.last_error = None;
      }),
      Err(e) => {
        let message = e.to_string();
        self.record(|s| s.last_error = Some(message));
      }
    }

    result
  }

  async fn run_pass(&self) -> Result<SyncOutcome> {
    info!("attempting sync");

    let pending = self.queue.list_all().await?;
    if pending.is_empty() {
      debug!("nothing to sync");
      return Ok(SyncOutcome { replayed: 0 });
    }

    let total = pending.len();
    let results = join_all(pending.iter().map(|todo| self.replay(todo))).await;

    let failed = results.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
      for (todo, result) in pending.iter().zip(&results) {
        match result {
          Err(e) if e.is_offline() => debug!(id = todo.id, error = %e, "remote unreachable, todo stays queued"),
          Err(e) => warn!(id = todo.id, error = %e, "failed to replay queued todo"),
          Ok(()) => {}
        }
      }
      return Err(EngineError::SyncPassIncomplete { failed, total });
    }

    self.queue.clear().await?;

    info!(replayed = total, "sync success");
    Ok(SyncOutcome { replayed: total })
  }

  /// One insert attempt, no retry.
  async fn replay(&self, todo: &Todo) -> Result<()> {
    let request = ApiRequest::new(Method::POST, COLLECTION_PATH).with_json(todo)?;
    let response = self.transport.send(&request).await?;

    if !response.is_success() {
      return Err(EngineError::RemoteRejected {
        status: response.status,
        status_text: response.status_text,
      });
    }
    Ok(())
  }

  fn record(&self, update: impl FnOnce(&mut SyncState)) {
    if let Ok(mut state) = self.state.lock() {
      update(&mut state);
    }
  }
}
