//! Test doubles for the remote todo service.

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::error::TransportError;
use crate::todo::{Todo, TodoFilter};

use super::transport::{http_date, ApiRequest, ApiResponse, Transport};

/// In-memory todo collection with the remote service's semantics.
#[derive(Default)]
pub struct TodoBackend {
  todos: Vec<Todo>,
}

impl TodoBackend {
  pub fn seeded() -> Self {
    Self {
      todos: vec![Todo {
        id: 1,
        title: "Hello world!".to_string(),
        completed: true,
        synced: None,
      }],
    }
  }

  fn filter_from(query: &HashMap<String, String>) -> TodoFilter {
    TodoFilter {
      id: query.get("id").and_then(|v| v.parse().ok()),
      completed: query.get("completed").map(|v| v == "true"),
    }
  }

  fn counts(&self) -> Value {
    let total = self.todos.len();
    let completed = self.todos.iter().filter(|t| t.completed).count();
    json!({ "total": total, "active": total - completed, "completed": completed })
  }

  pub fn find(&self, query: &HashMap<String, String>) -> Value {
    let filter = Self::filter_from(query);
    let items: Vec<Todo> = self
      .todos
      .iter()
      .filter(|t| filter.matches(t))
      .map(|t| Todo {
        synced: Some(true),
        ..t.clone()
      })
      .collect();
    json!({ "items": items, "counts": self.counts() })
  }

  pub fn insert(&mut self, todo: Todo) -> Value {
    self.todos.push(todo.clone());
    json!(todo)
  }

  pub fn update(&mut self, id: i64, changes: &Value) -> Option<Value> {
    let todo = self.todos.iter_mut().find(|t| t.id == id)?;
    if let Some(title) = changes.get("title").and_then(Value::as_str) {
      todo.title = title.to_string();
    }
    if let Some(completed) = changes.get("completed").and_then(Value::as_bool) {
      todo.completed = completed;
    }
    Some(json!(todo))
  }

  pub fn remove(&mut self, query: &HashMap<String, String>) -> Value {
    let filter = Self::filter_from(query);
    self.todos.retain(|t| !filter.matches(t));
    json!(self.todos)
  }

  pub fn ids(&self) -> Vec<i64> {
    self.todos.iter().map(|t| t.id).collect()
  }
}

/// Scripted `Transport` for engine tests.
///
/// Can be switched offline, told to reject inserts of particular ids with a
/// 500, and gated so requests stay in flight until released.
pub struct FakeRemote {
  backend: Mutex<TodoBackend>,
  assets: Mutex<BTreeMap<String, String>>,
  online: AtomicBool,
  rejected_ids: Mutex<HashSet<i64>>,
  calls: AtomicUsize,
  gate: Option<Arc<Semaphore>>,
}

impl FakeRemote {
  pub fn new() -> Self {
    Self {
      backend: Mutex::new(TodoBackend::seeded()),
      assets: Mutex::new(BTreeMap::new()),
      online: AtomicBool::new(true),
      rejected_ids: Mutex::new(HashSet::new()),
      calls: AtomicUsize::new(0),
      gate: None,
    }
  }

  /// Every request waits for a permit from the returned semaphore.
  pub fn gated() -> (Self, Arc<Semaphore>) {
    let gate = Arc::new(Semaphore::new(0));
    let remote = Self {
      gate: Some(Arc::clone(&gate)),
      ..Self::new()
    };
    (remote, gate)
  }

  pub fn with_asset(self, path: &str, body: &str) -> Self {
    self
      .assets
      .lock()
      .unwrap()
      .insert(path.to_string(), body.to_string());
    self
  }

  pub fn set_online(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }

  pub fn reject_insert_of(&self, id: i64) {
    self.rejected_ids.lock().unwrap().insert(id);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn stored_ids(&self) -> Vec<i64> {
    self.backend.lock().unwrap().ids()
  }

  fn json_response(status: u16, body: &Value) -> ApiResponse {
    let status_text = match status {
      200 => "OK",
      404 => "Not Found",
      500 => "Internal Server Error",
      _ => "",
    };
    ApiResponse::json(status, status_text, body.to_string().into_bytes(), Utc::now())
  }

  fn handle(&self, request: &ApiRequest) -> ApiResponse {
    let query: HashMap<String, String> = request.query.iter().cloned().collect();
    let body: Value = request
      .body
      .as_deref()
      .and_then(|b| serde_json::from_slice(b).ok())
      .unwrap_or(Value::Null);
    let mut backend = self.backend.lock().unwrap();

    match (&request.method, request.path.as_str()) {
      (&Method::GET, "/todos") => Self::json_response(200, &backend.find(&query)),
      (&Method::GET, "/todos/count") => Self::json_response(200, &backend.counts()),
      (&Method::POST, "/todos") => match serde_json::from_value::<Todo>(body) {
        Ok(todo) if self.rejected_ids.lock().unwrap().contains(&todo.id) => {
          Self::json_response(500, &json!({ "error": "rejected" }))
        }
        Ok(todo) => Self::json_response(200, &backend.insert(todo)),
        Err(_) => Self::json_response(500, &json!({ "error": "bad todo" })),
      },
      (&Method::DELETE, "/todos") => Self::json_response(200, &backend.remove(&query)),
      (&Method::PATCH, path) if path.starts_with("/todos/") => {
        let id = path.trim_start_matches("/todos/").parse().unwrap_or(-1);
        match backend.update(id, &body) {
          Some(todo) => Self::json_response(200, &todo),
          None => Self::json_response(404, &Value::Null),
        }
      }
      (&Method::GET, path) => match self.assets.lock().unwrap().get(path) {
        Some(asset) => ApiResponse::new(200, "OK", asset.clone().into_bytes())
          .with_header("date", &http_date(Utc::now())),
        None => Self::json_response(404, &Value::Null),
      },
      _ => Self::json_response(404, &Value::Null),
    }
  }
}

#[async_trait]
impl Transport for FakeRemote {
  async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
    self.calls.fetch_add(1, Ordering::SeqCst);

    if let Some(gate) = &self.gate {
      gate
        .acquire()
        .await
        .map_err(|_| TransportError::new("gate closed"))?
        .forget();
    }

    if !self.online.load(Ordering::SeqCst) {
      return Err(TransportError::new("connection refused"));
    }

    Ok(self.handle(request))
  }
}

type Shared = Arc<Mutex<TodoBackend>>;

fn dated(body: Value) -> impl IntoResponse {
  ([(header::DATE, http_date(Utc::now()))], Json(body))
}

async fn find_todos(State(db): State<Shared>, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
  dated(db.lock().unwrap().find(&q))
}

async fn insert_todo(State(db): State<Shared>, Json(todo): Json<Todo>) -> impl IntoResponse {
  dated(db.lock().unwrap().insert(todo))
}

async fn remove_todos(State(db): State<Shared>, Query(q): Query<HashMap<String, String>>) -> impl IntoResponse {
  dated(db.lock().unwrap().remove(&q))
}

async fn update_todo(
  State(db): State<Shared>,
  Path(id): Path<i64>,
  Json(changes): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
  db.lock()
    .unwrap()
    .update(id, &changes)
    .map(Json)
    .ok_or(StatusCode::NOT_FOUND)
}

/// Start a throwaway HTTP todo service on a random local port. Returns its base url.
pub async fn reference_server() -> String {
  let db: Shared = Arc::new(Mutex::new(TodoBackend::seeded()));
  let app = Router::new()
    .route("/todos", get(find_todos).post(insert_todo).delete(remove_todos))
    .route("/todos/:id", patch(update_todo))
    .with_state(db);

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    axum::serve(listener, app).await.unwrap();
  });

  format!("http://{}", addr)
}
