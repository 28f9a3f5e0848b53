//! Request interceptor: network first, then the offline strategies.
//!
//! Every request gets exactly one answer. API requests always wait for the
//! network attempt to resolve before any fallback is considered:
//! - success: GET responses are copied into the active cache namespace
//! - remote error status: surfaced as `RemoteRejected`, no fallback
//! - unreachable: inserts are queued (202), the top-level collection read is
//!   rebuilt from the cached snapshot plus queued todos, everything else is an
//!   exact cache lookup or `NotAvailable`
//!
//! Static shell resources are served cache-first.

use chrono::Utc;
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::CacheNamespace;
use crate::error::{EngineError, Result, TransportError};
use crate::queue::MutationQueue;
use crate::remote::{ApiRequest, ApiResponse, Transport};
use crate::todo::Todo;

/// Path of the todo collection on the remote.
pub const COLLECTION_PATH: &str = "/todos";

/// How the interceptor treats a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
  /// `GET /todos` with no filter
  CollectionRead,
  /// `POST /todos`
  Insert,
  /// Any other todo API request (filtered reads, updates, deletes, count)
  Api,
  /// Application shell resources
  Static,
}

impl RequestClass {
  pub fn of(request: &ApiRequest) -> Self {
    if !request.path.contains(COLLECTION_PATH) {
      return RequestClass::Static;
    }

    match (&request.method, request.path.as_str()) {
      (&Method::GET, COLLECTION_PATH) if request.query.is_empty() => RequestClass::CollectionRead,
      (&Method::POST, COLLECTION_PATH) => RequestClass::Insert,
      _ => RequestClass::Api,
    }
  }
}

pub struct Interceptor {
  transport: Arc<dyn Transport>,
  queue: MutationQueue,
  cache: CacheNamespace,
}

impl Interceptor {
  pub fn new(transport: Arc<dyn Transport>, queue: MutationQueue, cache: CacheNamespace) -> Self {
    Self {
      transport,
      queue,
      cache,
    }
  }

  pub fn queue(&self) -> &MutationQueue {
    &self.queue
  }

  pub fn cache(&self) -> &CacheNamespace {
    &self.cache
  }

  /// Answer `request`.
  pub async fn handle(&self, request: &ApiRequest) -> Result<ApiResponse> {
    let class = RequestClass::of(request);
    if class == RequestClass::Static {
      return self.handle_static(request).await;
    }

    match self.transport.send(request).await {
      Ok(response) => self.on_response(request, response).await,
      Err(err) => self.on_unreachable(class, request, err).await,
    }
  }

  async fn on_response(&self, request: &ApiRequest, response: ApiResponse) -> Result<ApiResponse> {
    if !response.is_success() {
      return Err(EngineError::RemoteRejected {
        status: response.status,
        status_text: response.status_text,
      });
    }

    if request.method == Method::GET {
      self.store_quietly(request, &response).await;
    }

    debug!(request = %request.request_line(), status = response.status, "sending network response");
    Ok(response)
  }

  /// Cache a response; a failed write is logged and never fails the request.
  async fn store_quietly(&self, request: &ApiRequest, response: &ApiResponse) {
    if let Err(e) = self.cache.put(request, response).await {
      warn!(request = %request.request_line(), error = %e, "failed to cache response");
    }
  }

  async fn on_unreachable(
    &self,
    class: RequestClass,
    request: &ApiRequest,
    err: TransportError,
  ) -> Result<ApiResponse> {
    match class {
      RequestClass::Insert => {
        let todo = request
          .body
          .as_deref()
          .map(serde_json::from_slice::<Todo>);

        match todo {
          Some(Ok(todo)) => return self.accept_offline_insert(todo).await,
          _ => warn!(request = %request.request_line(), "offline insert without a todo body"),
        }
      }
      RequestClass::CollectionRead => return self.merged_collection(request).await,
      _ => {}
    }

    warn!(
      request = %request.request_line(),
      error = %err,
      "API request failed, falling back to cache"
    );
    self.from_cache(request).await
  }

  async fn accept_offline_insert(&self, todo: Todo) -> Result<ApiResponse> {
    self.queue.put(&todo).await?;
    warn!(id = todo.id, "remote unreachable, todo queued for sync");

    Ok(ApiResponse::json(202, "Accepted", b"{}".to_vec(), Utc::now()))
  }

  /// Last cached collection with every queued todo appended.
  async fn merged_collection(&self, request: &ApiRequest) -> Result<ApiResponse> {
    let not_available = || EngineError::NotAvailable {
      request: request.request_line(),
    };

    let cached = self.cache.lookup(request).await?.ok_or_else(not_available)?;
    let mut body: serde_json::Map<String, Value> = serde_json::from_slice(&cached.response.body)?;

    let pending = self
      .queue
      .list_all()
      .await?
      .into_iter()
      .map(serde_json::to_value)
      .collect::<serde_json::Result<Vec<Value>>>()?;
    let pending_count = pending.len();

    body
      .get_mut("items")
      .and_then(Value::as_array_mut)
      .ok_or_else(not_available)?
      .extend(pending);

    debug!(pending = pending_count, "serving cached todos merged with unsynced todos");
    let json = serde_json::to_vec(&body)?;
    Ok(ApiResponse::json(200, "OK", json, Utc::now()))
  }

  async fn from_cache(&self, request: &ApiRequest) -> Result<ApiResponse> {
    match self.cache.lookup(request).await? {
      Some(cached) => {
        debug!(request = %request.request_line(), "found in cache");
        Ok(cached.response)
      }
      None => Err(EngineError::NotAvailable {
        request: request.request_line(),
      }),
    }
  }

  async fn handle_static(&self, request: &ApiRequest) -> Result<ApiResponse> {
    if let Some(cached) = self.cache.lookup(request).await? {
      debug!(request = %request.request_line(), "found in cache");
      return Ok(cached.response);
    }

    match self.transport.send(request).await {
      Ok(response) => self.on_response(request, response).await,
      Err(err) => {
        warn!(request = %request.request_line(), error = %err, "static resource unavailable");
        Err(EngineError::NotAvailable {
          request: request.request_line(),
        })
      }
    }
  }
}
