//! Engine context: owns the stores, the interceptor and the sync machinery.

use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::ResourceCache;
use crate::config::{CacheConfig, Config};
use crate::db::Database;
use crate::error::{EngineError, Result};
use crate::interceptor::Interceptor;
use crate::queue::MutationQueue;
use crate::remote::{RemoteClient, Transport};
use crate::sync::{
  ConnectivityMonitor, NetworkStatus, SchedulePolicy, SyncCoordinator, SyncHandle, SyncScheduler,
};
use crate::todo::TodoClient;

/// One isolated instance of the offline engine.
///
/// Nothing here is global: each instance has its own database handle,
/// transport and scheduler, and `shutdown` tears the background tasks down.
pub struct OfflineEngine {
  transport: Arc<dyn Transport>,
  cache: ResourceCache,
  queue: MutationQueue,
  interceptor: Arc<Interceptor>,
  coordinator: Arc<SyncCoordinator>,
  manifest: Vec<String>,
  scheduler: Option<SyncScheduler>,
}

impl OfflineEngine {
  /// Open the engine described by `config` against the real remote and
  /// bootstrap the active cache namespace if it has never been seeded.
  pub async fn open(config: &Config) -> color_eyre::Result<Self> {
    let data_dir = config.data_dir()?;
    let db = Arc::new(Database::open(&Database::default_path(&data_dir))?);
    let transport: Arc<dyn Transport> = Arc::new(RemoteClient::new(&config.remote)?);

    info!(remote = %config.remote.url, data_dir = %data_dir.display(), "opening offline engine");
    let engine = Self::with_parts(db, transport, &config.cache).await?;
    engine.bootstrap().await?;
    Ok(engine)
  }

  /// Build an engine around an existing database and transport.
  pub async fn with_parts(
    db: Arc<Database>,
    transport: Arc<dyn Transport>,
    cache_config: &CacheConfig,
  ) -> Result<Self> {
    let cache = ResourceCache::new(Arc::clone(&db));
    let active = cache.open(&cache_config.namespace()).await?;
    let queue = MutationQueue::new(db);

    let interceptor = Arc::new(Interceptor::new(
      Arc::clone(&transport),
      queue.clone(),
      active,
    ));
    let coordinator = Arc::new(SyncCoordinator::new(Arc::clone(&transport), queue.clone()));

    Ok(Self {
      transport,
      cache,
      queue,
      interceptor,
      coordinator,
      manifest: cache_config.manifest.clone(),
      scheduler: None,
    })
  }

  /// Seed the active namespace with the static manifest (no-op once seeded).
  pub async fn install(&self) -> Result<()> {
    self
      .cache
      .install(self.namespace(), &self.manifest, self.transport.as_ref())
      .await?;
    Ok(())
  }

  /// Startup seeding of the active namespace.
  ///
  /// A failed seed is logged and leaves the namespace unseeded, so the next
  /// startup retries from scratch. Returns whether the namespace is seeded.
  pub async fn bootstrap(&self) -> Result<bool> {
    if self.cache.is_seeded(self.namespace()).await? {
      return Ok(true);
    }

    match self.install().await {
      Ok(()) => Ok(true),
      Err(e @ EngineError::Bootstrap { .. }) => {
        warn!(namespace = self.namespace(), error = %e, "cache bootstrap failed, will retry on next start");
        Ok(false)
      }
      Err(e) => Err(e),
    }
  }

  /// Drop every cache namespace other than the active one.
  pub async fn activate(&self) -> Result<Vec<String>> {
    self.cache.delete_except(self.namespace()).await
  }

  pub fn namespace(&self) -> &str {
    self.interceptor.cache().name()
  }

  pub fn cache(&self) -> &ResourceCache {
    &self.cache
  }

  pub fn queue(&self) -> &MutationQueue {
    &self.queue
  }

  pub fn interceptor(&self) -> &Arc<Interceptor> {
    &self.interceptor
  }

  pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
    &self.coordinator
  }

  /// One-off reachability check of the remote.
  pub async fn probe(&self) -> NetworkStatus {
    ConnectivityMonitor::new(Arc::clone(&self.transport))
      .probe()
      .await
  }

  pub fn client(&self) -> TodoClient {
    TodoClient::new(Arc::clone(&self.interceptor))
  }

  /// Start the sync scheduler, or return the handle of the running one.
  pub fn spawn_scheduler(&mut self, policy: SchedulePolicy) -> SyncHandle {
    if let Some(scheduler) = &self.scheduler {
      return scheduler.handle();
    }

    let scheduler = SyncScheduler::spawn(
      Arc::clone(&self.coordinator),
      Arc::clone(&self.transport),
      policy,
    );
    let handle = scheduler.handle();
    self.scheduler = Some(scheduler);
    handle
  }

  /// Stop background tasks, letting a running pass finish.
  pub async fn shutdown(mut self) {
    if let Some(scheduler) = self.scheduler.take() {
      scheduler.shutdown().await;
    }
    info!("offline engine stopped");
  }
}
