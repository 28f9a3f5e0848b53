//! Todo records and the typed client the application talks to.

mod client;
mod types;

pub use client::TodoClient;
pub use types::{Counts, InsertOutcome, Todo, TodoFilter, TodoList, TodoListBody, TodoUpdate};
