//! The sync engine: user intents in, remote calls out, confirmed results back
//! into the store.
//!
//! # Design
//! Every remote operation is split in two, the same way `TodoClient` splits
//! building from parsing. `begin_*` checks preconditions and returns a
//! `PendingCall`; `resolve` takes that call plus whatever the host got back
//! and reconciles. Nothing in the store or edit buffer changes between the
//! two steps, and calls may be resolved in any order.
//!
//! Hosts that don't need that control use `load`, `create`, `toggle`,
//! `commit_edit` and `delete`, which run both halves around a `Transport`.
//!
//! Every outcome lands in a single error slot. It is last-write-wins: when
//! two calls are in flight, whichever resolves last decides what is shown.

use tracing::{debug, info, warn};

use crate::client::TodoClient;
use crate::edit::EditBuffer;
use crate::error::{ApiError, SyncError};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::session::Session;
use crate::store::TodoStore;
use crate::types::{CreateTodo, TodoId, TodoItem};
use crate::view::{self, RowView};

pub const FETCH_FAILED: &str = "Failed to fetch todos";
pub const CREATE_FAILED: &str = "Failed to create todo";
pub const TOGGLE_FAILED: &str = "Failed to update todo status";
pub const EDIT_FAILED: &str = "Failed to update todo text";
pub const DELETE_FAILED: &str = "Failed to delete todo";
pub const LOGOUT_FAILED: &str = "Logout failed";

/// Which operation a pending call belongs to, and the item it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallKind {
    Fetch,
    Create,
    Toggle(TodoId),
    EditText(TodoId),
    Delete(TodoId),
}

impl CallKind {
    pub fn name(&self) -> &'static str {
        match self {
            CallKind::Fetch => "fetch",
            CallKind::Create => "create",
            CallKind::Toggle(_) => "toggle",
            CallKind::EditText(_) => "edit_text",
            CallKind::Delete(_) => "delete",
        }
    }

    fn fallback_message(&self) -> &'static str {
        match self {
            CallKind::Fetch => FETCH_FAILED,
            CallKind::Create => CREATE_FAILED,
            CallKind::Toggle(_) => TOGGLE_FAILED,
            CallKind::EditText(_) => EDIT_FAILED,
            CallKind::Delete(_) => DELETE_FAILED,
        }
    }

    fn failed(&self, message: String) -> SyncError {
        match self {
            CallKind::Fetch => SyncError::FetchFailed(message),
            CallKind::Create => SyncError::CreateFailed(message),
            CallKind::Toggle(_) | CallKind::EditText(_) => SyncError::UpdateFailed(message),
            CallKind::Delete(_) => SyncError::DeleteFailed(message),
        }
    }
}

/// An issued call waiting for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    kind: CallKind,
    request: HttpRequest,
}

impl PendingCall {
    pub fn kind(&self) -> &CallKind {
        &self.kind
    }

    /// The request the host must execute.
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }
}

#[derive(Debug)]
pub struct SyncEngine {
    client: TodoClient,
    session: Session,
    store: TodoStore,
    edit: EditBuffer,
    input: String,
    error: Option<SyncError>,
    loading: bool,
}

impl SyncEngine {
    pub fn new(client: TodoClient, session: Session) -> Self {
        Self {
            client,
            session,
            store: TodoStore::new(),
            edit: EditBuffer::default(),
            input: String::new(),
            error: None,
            loading: false,
        }
    }

    pub fn store(&self) -> &TodoStore {
        &self.store
    }

    pub fn edit_buffer(&self) -> &EditBuffer {
        &self.edit
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Text of the "new todo" input.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    /// True strictly between issuing a fetch and resolving it.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn remaining_count(&self) -> usize {
        self.store.remaining_count()
    }

    pub fn rows(&self) -> Vec<RowView<'_>> {
        view::rows(&self.store, &self.edit)
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Starts editing `id` with its current text. Any other draft is dropped.
    /// Returns false if the item is not in the store.
    pub fn begin_edit(&mut self, id: &TodoId) -> bool {
        match self.store.get(id) {
            Some(item) => {
                self.edit.begin(item.id.clone(), &item.text);
                true
            }
            None => false,
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.edit.set_draft(text);
    }

    pub fn cancel_edit(&mut self) {
        self.edit.clear();
    }

    // ------------------------------------------------------------------
    // Issuing
    // ------------------------------------------------------------------

    pub fn begin_load(&mut self) -> Result<Option<PendingCall>, SyncError> {
        let call = self.issue(CallKind::Fetch, |client, token| client.build_fetch_todos(token))?;
        self.loading = true;
        Ok(Some(call))
    }

    /// Submits the input field. Blank input is ignored without a call.
    pub fn begin_create(&mut self) -> Result<Option<PendingCall>, SyncError> {
        let text = self.input.trim();
        if text.is_empty() {
            return Ok(None);
        }
        let input = CreateTodo {
            text: text.to_string(),
        };
        self.issue(CallKind::Create, |client, token| client.build_create_todo(token, &input))
            .map(Some)
    }

    pub fn begin_toggle(&mut self, id: &TodoId) -> Result<Option<PendingCall>, SyncError> {
        let Some(item) = self.store.get(id) else {
            return Ok(None);
        };
        let updated = item.toggled();
        self.issue(CallKind::Toggle(id.clone()), |client, token| {
            client.build_update_todo(token, &updated)
        })
        .map(Some)
    }

    /// Sends the active draft. No-op unless an edit is active, its draft is
    /// not blank and the item is still in the store.
    pub fn begin_commit_edit(&mut self) -> Result<Option<PendingCall>, SyncError> {
        let Some((id, draft)) = self.edit.committable() else {
            return Ok(None);
        };
        let Some(item) = self.store.get(id) else {
            return Ok(None);
        };
        let updated = item.with_text(draft);
        self.issue(CallKind::EditText(updated.id.clone()), |client, token| {
            client.build_update_todo(token, &updated)
        })
        .map(Some)
    }

    pub fn begin_delete(&mut self, id: &TodoId) -> Result<Option<PendingCall>, SyncError> {
        self.issue(CallKind::Delete(id.clone()), |client, token| {
            client.build_delete_todo(token, id)
        })
        .map(Some)
    }

    fn issue(
        &mut self,
        kind: CallKind,
        build: impl FnOnce(&TodoClient, &str) -> Result<HttpRequest, ApiError>,
    ) -> Result<PendingCall, SyncError> {
        let built = build(&self.client, self.session.token().unwrap_or_default());
        match built {
            Ok(request) => {
                debug!(op = kind.name(), method = request.method.as_str(), url = %request.url, "issuing call");
                Ok(PendingCall { kind, request })
            }
            Err(err) => Err(self.fail(&kind, &err)),
        }
    }

    // ------------------------------------------------------------------
    // Reconciling
    // ------------------------------------------------------------------

    /// Applies the outcome of `call`. `Err` in `outcome` means no response
    /// arrived at all.
    pub fn resolve(
        &mut self,
        call: PendingCall,
        outcome: Result<HttpResponse, ApiError>,
    ) -> Result<(), SyncError> {
        let kind = call.kind;
        if kind == CallKind::Fetch {
            self.loading = false;
        }
        match outcome.and_then(|response| self.reconcile(&kind, response)) {
            Ok(()) => {
                debug!(op = kind.name(), items = self.store.len(), "reconciled");
                self.error = None;
                Ok(())
            }
            Err(err) => Err(self.fail(&kind, &err)),
        }
    }

    fn reconcile(&mut self, kind: &CallKind, response: HttpResponse) -> Result<(), ApiError> {
        match kind {
            CallKind::Fetch => {
                let items = self.client.parse_fetch_todos(response)?;
                self.store.replace_all(items);
            }
            CallKind::Create => {
                let item = self.client.parse_create_todo(response)?;
                self.store.append(item);
                self.input.clear();
            }
            CallKind::Toggle(id) => {
                let item = confirmed_update(&self.client, id, response)?;
                self.store.replace_one(id, item);
            }
            CallKind::EditText(id) => {
                let item = confirmed_update(&self.client, id, response)?;
                self.store.replace_one(id, item);
                // A later begin_edit on another item wins over this commit.
                if self.edit.is_editing(id) {
                    self.edit.clear();
                }
            }
            CallKind::Delete(id) => {
                self.client.parse_delete_todo(response)?;
                self.store.remove_one(id);
            }
        }
        Ok(())
    }

    fn fail(&mut self, kind: &CallKind, err: &ApiError) -> SyncError {
        let message = err.service_message().unwrap_or(kind.fallback_message());
        warn!(op = kind.name(), error = %err, "call failed");
        let error = kind.failed(message.to_string());
        self.error = Some(error.clone());
        error
    }

    // ------------------------------------------------------------------
    // Driving through a transport
    // ------------------------------------------------------------------

    pub fn load<T: Transport + ?Sized>(&mut self, transport: &T) -> Result<(), SyncError> {
        let call = self.begin_load()?;
        self.drive(transport, call)
    }

    pub fn create<T: Transport + ?Sized>(&mut self, transport: &T) -> Result<(), SyncError> {
        let call = self.begin_create()?;
        self.drive(transport, call)
    }

    pub fn toggle<T: Transport + ?Sized>(&mut self, transport: &T, id: &TodoId) -> Result<(), SyncError> {
        let call = self.begin_toggle(id)?;
        self.drive(transport, call)
    }

    pub fn commit_edit<T: Transport + ?Sized>(&mut self, transport: &T) -> Result<(), SyncError> {
        let call = self.begin_commit_edit()?;
        self.drive(transport, call)
    }

    pub fn delete<T: Transport + ?Sized>(&mut self, transport: &T, id: &TodoId) -> Result<(), SyncError> {
        let call = self.begin_delete(id)?;
        self.drive(transport, call)
    }

    fn drive<T: Transport + ?Sized>(
        &mut self,
        transport: &T,
        call: Option<PendingCall>,
    ) -> Result<(), SyncError> {
        match call {
            Some(call) => {
                let outcome = transport.execute(call.request());
                self.resolve(call, outcome)
            }
            None => Ok(()),
        }
    }

    /// Clears the session token. No remote call is made.
    pub fn logout(&mut self) -> Result<(), SyncError> {
        match self.session.logout() {
            Ok(()) => {
                info!("session cleared");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to clear session token");
                let error = SyncError::LogoutFailed(LOGOUT_FAILED.to_string());
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }
}

/// Parses an update reply and checks it describes the item that was sent.
fn confirmed_update(client: &TodoClient, id: &TodoId, response: HttpResponse) -> Result<TodoItem, ApiError> {
    let item = client.parse_update_todo(response)?;
    if item.id != *id {
        return Err(ApiError::DeserializationError(format!(
            "update for {id} answered with {}",
            item.id
        )));
    }
    Ok(item)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;
    use crate::http::HttpMethod;

    /// Replays canned outcomes and records what was sent.
    #[derive(Default)]
    struct Scripted {
        replies: RefCell<VecDeque<Result<HttpResponse, ApiError>>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn reply(self, status: u16, body: &str) -> Self {
            self.replies
                .borrow_mut()
                .push_back(Ok(HttpResponse::new(status, body)));
            self
        }

        fn drop_connection(self) -> Self {
            self.replies
                .borrow_mut()
                .push_back(Err(ApiError::Transport("connection reset".into())));
            self
        }

        fn sent(&self) -> Vec<HttpRequest> {
            self.sent.borrow().clone()
        }
    }

    impl Transport for Scripted {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.borrow_mut().push(request.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .expect("unexpected request")
        }
    }

    fn engine() -> SyncEngine {
        SyncEngine::new(TodoClient::new("http://svc"), Session::with_token("tok"))
    }

    fn id(s: &str) -> TodoId {
        TodoId::new(s)
    }

    /// Engine whose store holds item 1 "A" (open) after a fetch.
    fn loaded() -> SyncEngine {
        let mut engine = engine();
        let net = Scripted::default().reply(
            200,
            r#"{"todoList":[{"_id":1,"text":"A","isComplete":false}]}"#,
        );
        engine.load(&net).unwrap();
        engine
    }

    #[test]
    fn load_populates_store_and_remaining_count() {
        let engine = loaded();
        assert_eq!(engine.store().len(), 1);
        assert_eq!(engine.remaining_count(), 1);
        assert!(engine.error().is_none());
        assert!(!engine.is_loading());
    }

    #[test]
    fn loading_flag_spans_only_the_pending_fetch() {
        let mut engine = engine();
        let call = engine.begin_load().unwrap().unwrap();
        assert!(engine.is_loading());
        engine
            .resolve(call, Err(ApiError::Transport("down".into())))
            .unwrap_err();
        assert!(!engine.is_loading());
    }

    #[test]
    fn failed_load_keeps_store_and_prefers_service_message() {
        let mut engine = loaded();
        let net = Scripted::default().reply(500, r#"{"message":"db offline"}"#);
        let err = engine.load(&net).unwrap_err();
        assert_eq!(err, SyncError::FetchFailed("db offline".into()));
        assert_eq!(engine.store().len(), 1);

        let net = Scripted::default().drop_connection();
        engine.load(&net).unwrap_err();
        assert_eq!(engine.error(), Some(&SyncError::FetchFailed(FETCH_FAILED.into())));
    }

    #[test]
    fn every_call_carries_bearer_token() {
        let mut engine = loaded();
        let net = Scripted::default()
            .reply(201, r#"{"newTodo":{"_id":"2","text":"B","isComplete":false}}"#)
            .reply(200, r#"{"todo":{"_id":"1","text":"A","isComplete":true}}"#)
            .reply(200, "");
        engine.set_input("B");
        engine.create(&net).unwrap();
        engine.toggle(&net, &id("1")).unwrap();
        engine.delete(&net, &id("2")).unwrap();
        for req in net.sent() {
            assert_eq!(req.header("authorization"), Some("Bearer tok"));
        }
    }

    #[test]
    fn whitespace_create_issues_nothing() {
        let mut engine = loaded();
        let before = engine.store().clone();
        engine.set_input("  ");
        let net = Scripted::default();
        engine.create(&net).unwrap();
        assert!(net.sent().is_empty());
        assert_eq!(engine.store(), &before);
        assert!(engine.error().is_none());
        assert_eq!(engine.input(), "  ");
    }

    #[test]
    fn create_appends_server_item_and_clears_input() {
        let mut engine = loaded();
        engine.set_input("  Buy milk ");
        let net = Scripted::default()
            .reply(201, r#"{"newTodo":{"_id":2,"text":"Buy milk","isComplete":false}}"#);
        engine.create(&net).unwrap();

        let body: serde_json::Value =
            serde_json::from_str(net.sent()[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["text"], "Buy milk");
        assert_eq!(engine.store().items().last().unwrap().id, id("2"));
        assert_eq!(engine.store().len(), 2);
        assert_eq!(engine.input(), "");
    }

    #[test]
    fn failed_create_keeps_input() {
        let mut engine = loaded();
        engine.set_input("Buy milk");
        let net = Scripted::default().reply(400, "");
        let err = engine.create(&net).unwrap_err();
        assert_eq!(err, SyncError::CreateFailed(CREATE_FAILED.into()));
        assert_eq!(engine.input(), "Buy milk");
        assert_eq!(engine.store().len(), 1);
    }

    #[test]
    fn toggle_sends_full_item_and_applies_server_copy() {
        let mut engine = loaded();
        let net = Scripted::default()
            .reply(200, r#"{"todo":{"_id":"1","text":"A (server)","isComplete":true}}"#);
        engine.toggle(&net, &id("1")).unwrap();

        let req = &net.sent()[0];
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.url, "http://svc/todo/update/1");
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["isComplete"], true);
        assert_eq!(body["text"], "A");

        let stored = engine.store().get(&id("1")).unwrap();
        assert_eq!(stored.text, "A (server)");
        assert_eq!(engine.remaining_count(), 0);
    }

    #[test]
    fn failed_toggle_leaves_item_unchanged() {
        let mut engine = loaded();
        let before = engine.store().clone();
        let net = Scripted::default().drop_connection();
        let err = engine.toggle(&net, &id("1")).unwrap_err();
        assert_eq!(err, SyncError::UpdateFailed(TOGGLE_FAILED.into()));
        assert_eq!(engine.store(), &before);
        assert_eq!(engine.error(), Some(&err));
    }

    #[test]
    fn toggle_of_unknown_id_is_a_no_op() {
        let mut engine = loaded();
        let net = Scripted::default();
        engine.toggle(&net, &id("nope")).unwrap();
        assert!(net.sent().is_empty());
    }

    #[test]
    fn switching_edit_target_discards_draft() {
        let mut engine = loaded();
        let net = Scripted::default()
            .reply(201, r#"{"newTodo":{"_id":"2","text":"B","isComplete":false}}"#);
        engine.set_input("B");
        engine.create(&net).unwrap();

        assert!(engine.begin_edit(&id("1")));
        assert_eq!(engine.edit_buffer().draft(), Some("A"));
        engine.set_draft("A changed");
        assert!(engine.begin_edit(&id("2")));
        assert_eq!(
            engine.edit_buffer(),
            &EditBuffer::Editing {
                id: id("2"),
                draft: "B".into()
            }
        );
        assert_eq!(engine.store().get(&id("1")).unwrap().text, "A");
    }

    #[test]
    fn commit_edit_goes_idle_only_after_confirmation() {
        let mut engine = loaded();
        engine.begin_edit(&id("1"));
        engine.set_draft("A2");

        let call = engine.begin_commit_edit().unwrap().unwrap();
        assert_eq!(engine.edit_buffer().active_id(), Some(&id("1")));
        assert_eq!(engine.store().get(&id("1")).unwrap().text, "A");

        engine
            .resolve(
                call,
                Ok(HttpResponse::new(
                    200,
                    r#"{"todo":{"_id":"1","text":"A2","isComplete":false}}"#,
                )),
            )
            .unwrap();
        assert_eq!(engine.edit_buffer(), &EditBuffer::Idle);
        assert_eq!(engine.store().get(&id("1")).unwrap().text, "A2");
    }

    #[test]
    fn failed_commit_keeps_editing() {
        let mut engine = loaded();
        engine.begin_edit(&id("1"));
        engine.set_draft("A2");
        let net = Scripted::default().reply(500, "");
        let err = engine.commit_edit(&net).unwrap_err();
        assert_eq!(err, SyncError::UpdateFailed(EDIT_FAILED.into()));
        assert_eq!(engine.edit_buffer().draft(), Some("A2"));
        assert_eq!(engine.store().get(&id("1")).unwrap().text, "A");
    }

    #[test]
    fn blank_draft_or_idle_commit_is_a_no_op() {
        let mut engine = loaded();
        assert!(engine.begin_commit_edit().unwrap().is_none());
        engine.begin_edit(&id("1"));
        engine.set_draft(" \t");
        assert!(engine.begin_commit_edit().unwrap().is_none());
    }

    #[test]
    fn delete_removes_after_confirmation() {
        let mut engine = loaded();
        let net = Scripted::default().reply(200, r#"{"message":"Todo deleted"}"#);
        engine.delete(&net, &id("1")).unwrap();
        assert!(engine.store().is_empty());
    }

    #[test]
    fn confirmed_delete_of_unknown_id_is_silent() {
        let mut engine = loaded();
        let net = Scripted::default().reply(200, "");
        engine.delete(&net, &id("404")).unwrap();
        assert_eq!(engine.store().len(), 1);
        assert!(engine.error().is_none());
    }

    #[test]
    fn failed_delete_keeps_item() {
        let mut engine = loaded();
        let net = Scripted::default().reply(404, r#"{"message":"Todo not found"}"#);
        let err = engine.delete(&net, &id("1")).unwrap_err();
        assert_eq!(err, SyncError::DeleteFailed("Todo not found".into()));
        assert_eq!(engine.store().len(), 1);
    }

    #[test]
    fn success_clears_previous_error() {
        let mut engine = loaded();
        let net = Scripted::default()
            .drop_connection()
            .reply(200, r#"{"todo":{"_id":"1","text":"A","isComplete":true}}"#);
        engine.toggle(&net, &id("1")).unwrap_err();
        assert!(engine.error().is_some());
        engine.toggle(&net, &id("1")).unwrap();
        assert!(engine.error().is_none());
    }

    #[test]
    fn update_reply_for_another_id_is_rejected() {
        let mut engine = engine();
        let net = Scripted::default()
            .reply(
                200,
                r#"{"todoList":[{"_id":"1","text":"A","isComplete":false},{"_id":"2","text":"B","isComplete":false}]}"#,
            )
            .reply(200, r#"{"todo":{"_id":"2","text":"A","isComplete":true}}"#);
        engine.load(&net).unwrap();

        let err = engine.toggle(&net, &id("1")).unwrap_err();
        assert_eq!(err, SyncError::UpdateFailed(TOGGLE_FAILED.into()));
        let ids: Vec<&str> = engine.store().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert!(!engine.store().get(&id("1")).unwrap().is_complete);
        assert_eq!(engine.store().get(&id("2")).unwrap().text, "B");
    }

    #[test]
    fn out_of_order_resolution_is_last_write_wins() {
        let mut engine = loaded();
        engine.set_input("B");
        let create = engine.begin_create().unwrap().unwrap();
        let toggle = engine.begin_toggle(&id("1")).unwrap().unwrap();

        // The toggle was issued last but resolves first, and fails.
        engine
            .resolve(toggle, Err(ApiError::Transport("timeout".into())))
            .unwrap_err();
        assert!(matches!(engine.error(), Some(SyncError::UpdateFailed(_))));

        engine
            .resolve(
                create,
                Ok(HttpResponse::new(
                    201,
                    r#"{"newTodo":{"_id":"2","text":"B","isComplete":false}}"#,
                )),
            )
            .unwrap();
        assert!(engine.error().is_none());
        assert_eq!(engine.store().len(), 2);
        assert!(!engine.store().get(&id("1")).unwrap().is_complete);
    }

    #[test]
    fn missing_token_fails_before_any_call() {
        let mut engine = SyncEngine::new(TodoClient::new("http://svc"), Session::with_token(""));
        let net = Scripted::default();
        let err = engine.load(&net).unwrap_err();
        assert_eq!(err, SyncError::FetchFailed(FETCH_FAILED.into()));
        assert!(net.sent().is_empty());
        assert!(!engine.is_loading());
    }

    #[test]
    fn logout_clears_token_without_a_call() {
        let mut engine = loaded();
        engine.logout().unwrap();
        assert!(!engine.session().is_authenticated());
        let net = Scripted::default();
        engine.load(&net).unwrap_err();
        assert!(net.sent().is_empty());
    }

    #[test]
    fn toggling_twice_restores_flag() {
        let mut engine = loaded();
        let net = Scripted::default()
            .reply(200, r#"{"todo":{"_id":"1","text":"A","isComplete":true}}"#)
            .reply(200, r#"{"todo":{"_id":"1","text":"A","isComplete":false}}"#);
        engine.toggle(&net, &id("1")).unwrap();
        engine.toggle(&net, &id("1")).unwrap();
        let sent = net.sent();
        let second: TodoItem = serde_json::from_str(sent[1].body.as_deref().unwrap()).unwrap();
        assert!(!second.is_complete);
        assert!(!engine.store().get(&id("1")).unwrap().is_complete);
    }
}
