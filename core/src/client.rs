//! Stateless HTTP request builder and response parser for the todo service.
//!
//! # Design
//! `TodoClient` holds only a `base_url`. Each operation is split into a
//! `build_*` method that produces an `HttpRequest` and a `parse_*` method
//! that consumes an `HttpResponse`. The bearer token is passed in per call so
//! the client never caches credentials.

use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    CreateTodo, ErrorBody, NewTodoEnvelope, TodoEnvelope, TodoId, TodoItem, TodoListEnvelope,
};

/// Synchronous, stateless client for the todo service.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_fetch_todos(&self, token: &str) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/todo/fetch", self.base_url),
            headers: vec![auth_header(token)?],
            body: None,
        })
    }

    pub fn build_create_todo(&self, token: &str, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(input).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/todo/create", self.base_url),
            headers: vec![auth_header(token)?, json_content_type()],
            body: Some(body),
        })
    }

    /// Builds an update carrying the full item; the path id is taken from it.
    pub fn build_update_todo(&self, token: &str, item: &TodoItem) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(item).map_err(|e| ApiError::SerializationError(e.to_string()))?;
        Ok(HttpRequest {
            method: HttpMethod::Put,
            url: format!("{}/todo/update/{}", self.base_url, path_segment(&item.id)),
            headers: vec![auth_header(token)?, json_content_type()],
            body: Some(body),
        })
    }

    pub fn build_delete_todo(&self, token: &str, id: &TodoId) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method: HttpMethod::Delete,
            url: format!("{}/todo/delete/{}", self.base_url, path_segment(id)),
            headers: vec![auth_header(token)?],
            body: None,
        })
    }

    pub fn parse_fetch_todos(&self, response: HttpResponse) -> Result<Vec<TodoItem>, ApiError> {
        let envelope: TodoListEnvelope = parse_body(&response)?;
        Ok(envelope.todo_list.unwrap_or_default())
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<TodoItem, ApiError> {
        let envelope: NewTodoEnvelope = parse_body(&response)?;
        Ok(envelope.new_todo)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<TodoItem, ApiError> {
        let envelope: TodoEnvelope = parse_body(&response)?;
        Ok(envelope.todo)
    }

    /// The delete body is ignored; only the status matters.
    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }
}

fn auth_header(token: &str) -> Result<(String, String), ApiError> {
    if token.is_empty() {
        return Err(ApiError::MissingToken);
    }
    Ok(("authorization".to_string(), format!("Bearer {token}")))
}

/// Ids are opaque, so reserved characters must not reach the path unescaped.
fn path_segment(id: &TodoId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

fn json_content_type() -> (String, String) {
    ("content-type".to_string(), "application/json".to_string())
}

fn parse_body<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, ApiError> {
    check_status(response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::DeserializationError(e.to_string()))
}

/// Map non-2xx status codes to the appropriate `ApiError` variant.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if response.is_success() {
        return Ok(());
    }
    let message = serde_json::from_str::<ErrorBody>(&response.body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.is_empty());
    Err(match response.status {
        401 => ApiError::Unauthorized { message },
        404 => ApiError::NotFound { message },
        status => ApiError::HttpError { status, message },
    })
}
