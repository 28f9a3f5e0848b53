//! Trigger dispatch for reconciliation passes.
//!
//! Every trigger (connectivity restored, periodic, manual) is submitted as a
//! request carrying a completion handle. Each request runs as its own task, so
//! a trigger that arrives while a pass is running is rejected by the
//! coordinator's in-flight guard instead of being queued behind it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::remote::Transport;

use super::coordinator::{SyncCoordinator, SyncOutcome};
use super::monitor::ConnectivityMonitor;

/// Who asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
  /// The remote became reachable again
  ConnectivityRestored,
  /// Periodic retry policy
  Periodic,
  /// Explicit force-sync command
  Manual,
}

/// Which background producers to run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulePolicy {
  /// Period of the `Periodic` trigger; first tick fires immediately
  pub interval: Option<Duration>,
  /// Period of the connectivity probe
  pub probe: Option<Duration>,
}

struct SyncRequest {
  trigger: SyncTrigger,
  done: oneshot::Sender<Result<SyncOutcome>>,
}

/// Cloneable submission end of the scheduler.
#[derive(Clone)]
pub struct SyncHandle {
  tx: mpsc::UnboundedSender<SyncRequest>,
}

impl SyncHandle {
  /// Submit a trigger; the receiver resolves with that pass's result.
  pub fn submit(&self, trigger: SyncTrigger) -> Result<oneshot::Receiver<Result<SyncOutcome>>> {
    let (done, rx) = oneshot::channel();
    self
      .tx
      .send(SyncRequest { trigger, done })
      .map_err(|_| EngineError::Shutdown)?;
    Ok(rx)
  }

  /// Submit a trigger and wait for its pass.
  pub async fn request(&self, trigger: SyncTrigger) -> Result<SyncOutcome> {
    self.submit(trigger)?.await.map_err(|_| EngineError::Shutdown)?
  }
}

/// Running scheduler: the dispatcher plus any background producers.
pub struct SyncScheduler {
  handle: SyncHandle,
  shutdown: watch::Sender<bool>,
  tasks: Vec<JoinHandle<()>>,
}

impl SyncScheduler {
  pub fn spawn(
    coordinator: Arc<SyncCoordinator>,
    transport: Arc<dyn Transport>,
    policy: SchedulePolicy,
  ) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = SyncHandle { tx };

    let mut tasks = vec![tokio::spawn(dispatch(coordinator, rx, shutdown_rx.clone()))];

    if let Some(period) = policy.interval {
      tasks.push(tokio::spawn(periodic(handle.clone(), period, shutdown_rx.clone())));
    }

    if let Some(period) = policy.probe {
      let monitor = ConnectivityMonitor::new(transport);
      tasks.push(tokio::spawn(watch_connectivity(
        handle.clone(),
        monitor,
        period,
        shutdown_rx,
      )));
    }

    Self {
      handle,
      shutdown,
      tasks,
    }
  }

  pub fn handle(&self) -> SyncHandle {
    self.handle.clone()
  }

  /// Stop producers and the dispatcher, waiting for running passes to finish.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    for task in self.tasks {
      if let Err(e) = task.await {
        warn!(error = %e, "sync task ended abnormally");
      }
    }
    debug!("sync scheduler stopped");
  }
}

async fn dispatch(
  coordinator: Arc<SyncCoordinator>,
  mut rx: mpsc::UnboundedReceiver<SyncRequest>,
  mut shutdown: watch::Receiver<bool>,
) {
  let mut passes = JoinSet::new();

  loop {
    tokio::select! {
      request = rx.recv() => {
        let Some(request) = request else { break };
        let coordinator = Arc::clone(&coordinator);
        passes.spawn(async move {
          debug!(trigger = ?request.trigger, "sync requested");
          let result = coordinator.attempt_sync().await;
          // Receiver may have been dropped by a caller that stopped waiting
          let _ = request.done.send(result);
        });
      }
      Some(joined) = passes.join_next(), if !passes.is_empty() => {
        if let Err(e) = joined {
          warn!(error = %e, "sync pass panicked");
        }
      }
      _ = shutdown.changed() => break,
    }
  }

  rx.close();
  while let Some(joined) = passes.join_next().await {
    if let Err(e) = joined {
      warn!(error = %e, "sync pass panicked");
    }
  }
}

async fn periodic(handle: SyncHandle, period: Duration, mut shutdown: watch::Receiver<bool>) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      _ = ticker.tick() => report(SyncTrigger::Periodic, handle.request(SyncTrigger::Periodic).await),
      _ = shutdown.changed() => break,
    }
  }
}

async fn watch_connectivity(
  handle: SyncHandle,
  mut monitor: ConnectivityMonitor,
  period: Duration,
  mut shutdown: watch::Receiver<bool>,
) {
  let mut ticker = tokio::time::interval(period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

  loop {
    tokio::select! {
      _ = ticker.tick() => {
        if monitor.poll().await {
          info!("connectivity restored");
          report(
            SyncTrigger::ConnectivityRestored,
            handle.request(SyncTrigger::ConnectivityRestored).await,
          );
        }
      }
      _ = shutdown.changed() => break,
    }
  }
}

fn report(trigger: SyncTrigger, result: Result<SyncOutcome>) {
  match result {
    Ok(outcome) => debug!(?trigger, replayed = outcome.replayed, "sync pass finished"),
    Err(EngineError::SyncInFlight) => debug!(?trigger, "sync pass already running"),
    Err(EngineError::Shutdown) => {}
    Err(e) => warn!(?trigger, error = %e, "sync pass failed, will retry"),
  }
}
