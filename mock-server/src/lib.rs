use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Todo {
    #[serde(rename = "_id")]
    pub id: String,
    pub text: String,
    #[serde(rename = "isComplete")]
    pub is_complete: bool,
}

#[derive(Deserialize)]
pub struct CreateTodo {
    pub text: String,
}

/// Update body. Clients send the whole item; only these fields are applied.
#[derive(Deserialize)]
pub struct UpdateTodo {
    pub text: Option<String>,
    #[serde(rename = "isComplete")]
    pub is_complete: Option<bool>,
}

/// Each accepted bearer token owns its own ordered list.
pub type Db = Arc<RwLock<HashMap<String, Vec<Todo>>>>;

/// A failed request: status plus the `{ "message": ... }` body.
#[derive(Debug)]
pub struct Failure(StatusCode, &'static str);

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

pub fn app<I, S>(tokens: I) -> Router
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let db: Db = Arc::new(RwLock::new(
        tokens.into_iter().map(|t| (t.into(), Vec::new())).collect(),
    ));
    Router::new()
        .route("/todo/fetch", get(fetch_todos))
        .route("/todo/create", post(create_todo))
        .route("/todo/update/{id}", put(update_todo))
        .route("/todo/delete/{id}", delete(delete_todo))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run<I, S>(listener: TcpListener, tokens: I) -> Result<(), std::io::Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    axum::serve(listener, app(tokens)).await
}

/// Extract the bearer token and check it is one the server knows.
fn bearer(headers: &HeaderMap, db: &HashMap<String, Vec<Todo>>) -> Result<String, Failure> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|token| db.contains_key(*token))
        .map(str::to_string)
        .ok_or(Failure(StatusCode::UNAUTHORIZED, "Unauthorized"))
}

async fn fetch_todos(State(db): State<Db>, headers: HeaderMap) -> Result<Json<serde_json::Value>, Failure> {
    let db = db.read().await;
    let token = bearer(&headers, &db)?;
    let todos = db.get(&token).cloned().unwrap_or_default();
    Ok(Json(json!({ "todoList": todos })))
}

async fn create_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreateTodo>,
) -> Result<(StatusCode, Json<serde_json::Value>), Failure> {
    let mut db = db.write().await;
    let token = bearer(&headers, &db)?;
    if input.text.trim().is_empty() {
        return Err(Failure(StatusCode::BAD_REQUEST, "Text is required"));
    }
    let todo = Todo {
        id: Uuid::new_v4().simple().to_string(),
        text: input.text,
        is_complete: false,
    };
    tracing::debug!(id = %todo.id, "created todo");
    db.entry(token).or_default().push(todo.clone());
    Ok((StatusCode::CREATED, Json(json!({ "newTodo": todo }))))
}

async fn update_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<UpdateTodo>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = db.write().await;
    let token = bearer(&headers, &db)?;
    let todo = db
        .get_mut(&token)
        .and_then(|todos| todos.iter_mut().find(|t| t.id == id))
        .ok_or(Failure(StatusCode::NOT_FOUND, "Todo not found"))?;
    if let Some(text) = input.text {
        todo.text = text;
    }
    if let Some(is_complete) = input.is_complete {
        todo.is_complete = is_complete;
    }
    Ok(Json(json!({ "todo": todo })))
}

async fn delete_todo(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, Failure> {
    let mut db = db.write().await;
    let token = bearer(&headers, &db)?;
    let todos = db.entry(token).or_default();
    let pos = todos
        .iter()
        .position(|t| t.id == id)
        .ok_or(Failure(StatusCode::NOT_FOUND, "Todo not found"))?;
    todos.remove(pos);
    Ok(Json(json!({ "message": "Todo deleted" })))
}
