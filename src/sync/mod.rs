//! Reconciliation of queued offline inserts with the remote.

mod coordinator;
mod monitor;
mod scheduler;

pub use coordinator::{SyncCoordinator, SyncOutcome, SyncState};
pub use monitor::{ConnectivityMonitor, NetworkStatus};
pub use scheduler::{SchedulePolicy, SyncHandle, SyncScheduler, SyncTrigger};
