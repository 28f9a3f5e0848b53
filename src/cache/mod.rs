//! Versioned response cache for offline reads.
//!
//! This module stores previously served responses so reads can be answered
//! when the remote is unreachable:
//! - One namespace per cache generation (`todo-v{version}`)
//! - A namespace is seeded with the static application shell in a single
//!   all-or-nothing transaction
//! - Exact-match lookup by request line (method, path and query)
//! - Stale generations are only removed by an explicit activation step

mod storage;

pub use storage::{CacheNamespace, CachedResponse, ResourceCache};

/// Namespace name for a cache version.
pub fn namespace_name(version: u32) -> String {
  format!("todo-v{}", version)
}
