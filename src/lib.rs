//! Offline-first interception and sync engine for a remote todo service.
//!
//! Requests go through an [`Interceptor`](interceptor::Interceptor) that tries
//! the network first and, when the remote is unreachable, answers from a
//! versioned response cache or queues inserts in a durable SQLite store. A
//! [`SyncCoordinator`](sync::SyncCoordinator) later replays the queue.

pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod interceptor;
pub mod logging;
pub mod queue;
pub mod remote;
pub mod sync;
pub mod todo;

pub use engine::OfflineEngine;
pub use error::{EngineError, TransportError};
