//! Typed todo client that routes every call through the interceptor.

use reqwest::Method;
use std::sync::Arc;

use crate::error::Result;
use crate::interceptor::{Interceptor, COLLECTION_PATH};
use crate::remote::ApiRequest;

use super::types::{Counts, InsertOutcome, Todo, TodoFilter, TodoList, TodoListBody, TodoUpdate};

/// Todo client with transparent offline support.
///
/// Exposes the remote service's operations; when the remote is unreachable the
/// interceptor answers from the cache or the sync queue where it can.
#[derive(Clone)]
pub struct TodoClient {
  interceptor: Arc<Interceptor>,
}

impl TodoClient {
  pub fn new(interceptor: Arc<Interceptor>) -> Self {
    Self { interceptor }
  }

  /// Find todos matching `filter`.
  pub async fn find(&self, filter: &TodoFilter) -> Result<TodoList> {
    let request = ApiRequest::get(COLLECTION_PATH).with_query(filter.to_query());
    let response = self.interceptor.handle(&request).await?;
    let body: TodoListBody = serde_json::from_slice(&response.body)?;

    Ok(TodoList {
      items: body.items,
      counts: body.counts,
      date: response.date(),
    })
  }

  /// Insert a todo. Queued locally when the remote is unreachable.
  pub async fn insert(&self, todo: &Todo) -> Result<InsertOutcome> {
    let request = ApiRequest::new(Method::POST, COLLECTION_PATH).with_json(todo)?;
    let response = self.interceptor.handle(&request).await?;

    if response.status == 202 {
      return Ok(InsertOutcome::Queued);
    }
    Ok(InsertOutcome::Confirmed(serde_json::from_slice(&response.body)?))
  }

  /// Apply a partial update (not available offline).
  pub async fn update(&self, update: &TodoUpdate) -> Result<Todo> {
    let path = format!("{}/{}", COLLECTION_PATH, update.id);
    let request = ApiRequest::new(Method::PATCH, path).with_json(update)?;
    let response = self.interceptor.handle(&request).await?;
    Ok(serde_json::from_slice(&response.body)?)
  }

  /// Remove todos matching `filter`; returns what remains (not available offline).
  pub async fn remove(&self, filter: &TodoFilter) -> Result<Vec<Todo>> {
    let request = ApiRequest::new(Method::DELETE, COLLECTION_PATH).with_query(filter.to_query());
    let response = self.interceptor.handle(&request).await?;
    Ok(serde_json::from_slice(&response.body)?)
  }

  /// Total, active and completed counts.
  pub async fn count(&self) -> Result<Counts> {
    let request = ApiRequest::get(format!("{}/count", COLLECTION_PATH));
    let response = self.interceptor.handle(&request).await?;
    Ok(serde_json::from_slice(&response.body)?)
  }

  /// Set every todo to `completed`. Returns how many were changed.
  pub async fn toggle_all(&self, completed: bool) -> Result<usize> {
    let list = self.find(&TodoFilter::by_completed(!completed)).await?;

    for todo in &list.items {
      self.update(&TodoUpdate::completed(todo.id, completed)).await?;
    }

    Ok(list.items.len())
  }

  pub async fn remove_completed(&self) -> Result<Vec<Todo>> {
    self.remove(&TodoFilter::by_completed(true)).await
  }
}
