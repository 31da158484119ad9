//! Client core for the todo service.
//!
//! # Overview
//! Keeps a local, server-confirmed copy of the user's todos and an edit
//! buffer, and turns user intents into authenticated calls against the
//! service. The core never touches the network: it builds `HttpRequest`
//! values and parses `HttpResponse` values, and the host executes the
//! round-trip (host-does-IO pattern).
//!
//! # Design
//! - `TodoClient` is stateless: `build_*` produces a request, `parse_*`
//!   consumes a response.
//! - `SyncEngine` owns the store, the edit buffer, the new-todo input and
//!   the error slot. The store only changes from confirmed responses.
//! - `Session` carries the bearer token explicitly instead of reading it
//!   from ambient global state.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod edit;
pub mod error;
pub mod http;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
pub mod view;

pub use client::TodoClient;
pub use edit::EditBuffer;
pub use error::{ApiError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use session::{FileTokenStore, MemoryTokenStore, Session, TokenStore};
pub use store::TodoStore;
pub use sync::{CallKind, PendingCall, SyncEngine};
pub use types::{CreateTodo, TodoId, TodoItem};
pub use view::{ItemStyle, RowView};
