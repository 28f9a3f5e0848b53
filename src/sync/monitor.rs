//! Connectivity detection by probing the remote.

use std::sync::Arc;

use crate::remote::{ApiRequest, Transport};

/// Path probed to decide whether the remote is reachable.
const PROBE_PATH: &str = "/todos/count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
  Online,
  Offline,
  Unknown,
}

/// Tracks reachability and reports offline → online transitions.
pub struct ConnectivityMonitor {
  transport: Arc<dyn Transport>,
  status: NetworkStatus,
}

impl ConnectivityMonitor {
  pub fn new(transport: Arc<dyn Transport>) -> Self {
    Self {
      transport,
      status: NetworkStatus::Unknown,
    }
  }

  pub fn status(&self) -> NetworkStatus {
    self.status
  }

  /// Probe once. Any answer, even an error status, counts as online.
  pub async fn probe(&self) -> NetworkStatus {
    match self.transport.send(&ApiRequest::get(PROBE_PATH)).await {
      Ok(_) => NetworkStatus::Online,
      Err(_) => NetworkStatus::Offline,
    }
  }

  /// Record `status`; true when it means connectivity was just restored.
  ///
  /// The first observation never counts as a restoration.
  pub fn observe(&mut self, status: NetworkStatus) -> bool {
    let restored = self.status == NetworkStatus::Offline && status == NetworkStatus::Online;
    self.status = status;
    restored
  }

  /// Probe and observe in one step.
  pub async fn poll(&mut self) -> bool {
    let status = self.probe().await;
    self.observe(status)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::testing::FakeRemote;

  #[test]
  fn test_only_offline_to_online_is_a_restoration() {
    let mut monitor = ConnectivityMonitor::new(Arc::new(FakeRemote::new()));

    assert!(!monitor.observe(NetworkStatus::Online));
    assert!(!monitor.observe(NetworkStatus::Online));
    assert!(!monitor.observe(NetworkStatus::Offline));
    assert!(!monitor.observe(NetworkStatus::Offline));
    assert!(monitor.observe(NetworkStatus::Online));
    assert_eq!(monitor.status(), NetworkStatus::Online);
  }

  #[tokio::test]
  async fn test_poll_follows_the_remote() {
    let remote = Arc::new(FakeRemote::new());
    let transport: Arc<dyn Transport> = remote.clone();
    let mut monitor = ConnectivityMonitor::new(transport);

    remote.set_online(false);
    assert!(!monitor.poll().await);
    assert_eq!(monitor.status(), NetworkStatus::Offline);

    remote.set_online(true);
    assert!(monitor.poll().await);
    assert!(!monitor.poll().await);
  }
}
