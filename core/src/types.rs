//! Wire DTOs for the todo service.
//!
//! # Design
//! These types mirror the mock-server's schema but are defined independently;
//! integration tests catch any drift between the two crates. The service
//! speaks camelCase and names the identifier `_id`, so the Rust field names
//! are mapped with serde attributes rather than leaking the wire spelling.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier assigned by the service when a todo is created.
///
/// Services differ in whether they hand out string or integer ids; both are
/// accepted on input and carried as a string from then on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct TodoId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawId> for TodoId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => TodoId(s),
            RawId::Number(n) => TodoId(n.to_string()),
        }
    }
}

impl TodoId {
    pub fn new(id: impl Into<String>) -> Self {
        TodoId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TodoId> for String {
    fn from(id: TodoId) -> Self {
        id.0
    }
}

impl From<&str> for TodoId {
    fn from(s: &str) -> Self {
        TodoId(s.to_string())
    }
}

impl From<u64> for TodoId {
    fn from(n: u64) -> Self {
        TodoId(n.to_string())
    }
}

/// A single todo item as the service returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: TodoId,
    pub text: String,
    #[serde(rename = "isComplete", default)]
    pub is_complete: bool,
}

impl TodoItem {
    /// Copy of this item with the completion flag inverted.
    pub fn toggled(&self) -> Self {
        Self {
            is_complete: !self.is_complete,
            ..self.clone()
        }
    }

    /// Copy of this item carrying `text` instead of its current text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}

/// Request payload for creating a todo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTodo {
    pub text: String,
}

/// `GET /todo/fetch` success body. A missing or null list means "no todos".
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TodoListEnvelope {
    #[serde(default)]
    pub todo_list: Option<Vec<TodoItem>>,
}

/// `POST /todo/create` success body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewTodoEnvelope {
    pub new_todo: TodoItem,
}

/// `PUT /todo/update/{id}` success body.
#[derive(Debug, Deserialize)]
pub(crate) struct TodoEnvelope {
    pub todo: TodoItem,
}

/// Error body the service sends alongside a non-2xx status.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}
