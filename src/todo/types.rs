use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single todo record as the remote service stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
  /// Caller-assigned id (millisecond timestamp at creation)
  pub id: i64,
  pub title: String,
  pub completed: bool,
  /// Set by the remote on every item it returns; absent on items still queued locally
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub synced: Option<bool>,
}

impl Todo {
  /// Create a new, not yet completed todo with a timestamp id.
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      id: Utc::now().timestamp_millis(),
      title: title.into(),
      completed: false,
      synced: None,
    }
  }

  pub fn is_synced(&self) -> bool {
    self.synced.unwrap_or(false)
  }
}

/// Partial-field predicate over todos. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoFilter {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<i64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

impl TodoFilter {
  pub fn all() -> Self {
    Self::default()
  }

  pub fn by_id(id: i64) -> Self {
    Self {
      id: Some(id),
      ..Self::default()
    }
  }

  pub fn by_completed(completed: bool) -> Self {
    Self {
      completed: Some(completed),
      ..Self::default()
    }
  }

  pub fn is_empty(&self) -> bool {
    self.id.is_none() && self.completed.is_none()
  }

  /// Exact equality on every present field.
  pub fn matches(&self, todo: &Todo) -> bool {
    self.id.map_or(true, |id| todo.id == id)
      && self.completed.map_or(true, |c| todo.completed == c)
  }

  /// Encode as query parameters, in a stable field order.
  pub fn to_query(&self) -> Vec<(String, String)> {
    let mut query = Vec::new();
    if let Some(id) = self.id {
      query.push(("id".to_string(), id.to_string()));
    }
    if let Some(completed) = self.completed {
      query.push(("completed".to_string(), completed.to_string()));
    }
    query
  }
}

/// Partial update: `id` plus at least one mutable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoUpdate {
  pub id: i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed: Option<bool>,
}

impl TodoUpdate {
  pub fn title(id: i64, title: impl Into<String>) -> Self {
    Self {
      id,
      title: Some(title.into()),
      completed: None,
    }
  }

  pub fn completed(id: i64, completed: bool) -> Self {
    Self {
      id,
      title: None,
      completed: Some(completed),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
  pub total: u64,
  pub active: u64,
  pub completed: u64,
}

/// Body of a collection read.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoListBody {
  pub items: Vec<Todo>,
  #[serde(default)]
  pub counts: Counts,
}

/// Result of `find`, with the response `date` header when the remote (or the
/// engine, for synthetic responses) supplied one.
#[derive(Debug, Clone)]
pub struct TodoList {
  pub items: Vec<Todo>,
  pub counts: Counts,
  pub date: Option<DateTime<Utc>>,
}

/// What happened to an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
  /// Remote stored it and echoed it back
  Confirmed(Todo),
  /// Remote unreachable; held locally until the next sync pass
  Queued,
}
