//! Root orchestration: owns the conversation state and drives the backend and
//! the session store.
//!
//! Every operation that talks to the backend comes in two shapes. The
//! `begin_*`/`finish_*` halves let an event loop keep drawing while the
//! request is in flight; `resume` and `send` chain the halves for callers that
//! can simply await.

use std::sync::Arc;

use chrono::Utc;

use crate::api::{ChatBackend, ChatReply};
use crate::error::ApiError;
use crate::message::Message;
use crate::session::SessionStore;
use crate::state::{ChatState, Epoch, HistoryRequest, SendRequest};

pub struct ChatWidget {
    state: ChatState,
    backend: Arc<dyn ChatBackend>,
    store: Box<dyn SessionStore>,
}

impl ChatWidget {
    pub fn new(backend: Arc<dyn ChatBackend>, store: Box<dyn SessionStore>) -> Self {
        Self {
            state: ChatState::new(),
            backend,
            store,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    /// Shared handle to the backend, for spawning requests off the UI loop
    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// Pick up the stored session id, if any, and mark its history as loading
    pub fn begin_resume(&mut self) -> Option<HistoryRequest> {
        let stored = match self.store.load() {
            Ok(id) => id?,
            Err(e) => {
                tracing::warn!(error = %e, "could not read stored session id");
                return None;
            }
        };
        tracing::info!(session_id = %stored, "resuming conversation");
        self.state.begin_history_load(stored)
    }

    pub fn finish_resume(&mut self, epoch: Epoch, result: Result<Vec<Message>, ApiError>) {
        match result {
            Ok(messages) => {
                tracing::info!(count = messages.len(), "loaded conversation history");
                self.state.complete_history_load(epoch, messages);
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load history, starting fresh");
                if self.state.fail_history_load(epoch) {
                    self.clear_stored_session();
                }
            }
        }
    }

    /// Restore the previous conversation on start-up
    pub async fn resume(&mut self) {
        if let Some(request) = self.begin_resume() {
            let result = self.backend.get_conversation(&request.session_id).await;
            self.finish_resume(request.epoch, result);
        }
    }

    /// Append the user's message and hand back the request to issue.
    ///
    /// `None` means the input was not accepted: a request is already in flight
    /// or the text is blank.
    pub fn begin_send(&mut self, text: &str) -> Option<SendRequest> {
        let request = self.state.begin_send(text, Utc::now());
        if request.is_none() {
            tracing::debug!(loading = self.state.is_loading(), "send ignored");
        }
        request
    }

    pub fn finish_send(&mut self, epoch: Epoch, result: Result<ChatReply, ApiError>) {
        match result {
            Ok(reply) => {
                if let Some(session_id) = self.state.complete_send(epoch, reply, Utc::now()) {
                    tracing::info!(%session_id, "conversation started");
                    if let Err(e) = self.store.save(&session_id) {
                        tracing::warn!(error = %e, "could not persist session id");
                    }
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to send message");
                self.state.fail_send(epoch, &e.to_string(), Utc::now());
            }
        }
    }

    /// Send one message and wait for the reply. Returns false if the message
    /// was not accepted.
    pub async fn send(&mut self, text: &str) -> bool {
        let Some(request) = self.begin_send(text) else {
            return false;
        };
        let result = self
            .backend
            .send_message(&request.message, request.session_id.as_deref())
            .await;
        self.finish_send(request.epoch, result);
        true
    }

    /// Drop the current conversation and forget its id
    pub fn new_chat(&mut self) {
        tracing::info!("starting new chat");
        self.state.reset();
        self.clear_stored_session();
    }

    fn clear_stored_session(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "could not clear stored session id");
        }
    }
}
