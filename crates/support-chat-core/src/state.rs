//! UI-agnostic conversation state
//!
//! `ChatState` holds everything a front end needs to draw the widget: the
//! transcript, the active session id, the loading flag and the error banner.
//! All mutation goes through the transition functions below, none of which do
//! any I/O. Persistence side effects are reported back to the caller.

use chrono::{DateTime, Utc};

use crate::api::ChatReply;
use crate::message::Message;

/// Fallback banner text when a send fails without a more specific message
pub const DEFAULT_SEND_ERROR: &str = "Failed to send message. Please try again.";

/// Identifies the conversation a request was issued for.
///
/// `reset` bumps the epoch, so a reply that arrives after "new chat" can be
/// recognised and dropped instead of leaking into the fresh conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

/// What the caller must send to the backend after `begin_send`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub message: String,
    pub session_id: Option<String>,
    pub epoch: Epoch,
}

/// What the caller must fetch after `begin_history_load`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub session_id: String,
    pub epoch: Epoch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    messages: Vec<Message>,
    session_id: Option<String>,
    loading: bool,
    error: Option<String>,
    epoch: u64,
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            session_id: None,
            loading: false,
            error: None,
            epoch: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn current_epoch(&self) -> Epoch {
        Epoch(self.epoch)
    }

    /// Adopt a previously stored session id and start loading its history.
    ///
    /// Returns `None` if another request is already in flight.
    pub fn begin_history_load(&mut self, session_id: String) -> Option<HistoryRequest> {
        if self.loading {
            return None;
        }
        self.session_id = Some(session_id.clone());
        self.loading = true;
        Some(HistoryRequest {
            session_id,
            epoch: self.current_epoch(),
        })
    }

    /// Replace the transcript with the fetched history
    pub fn complete_history_load(&mut self, epoch: Epoch, messages: Vec<Message>) {
        if !self.settle(epoch) {
            return;
        }
        self.messages = messages;
    }

    /// The stored session is unusable: forget it and show an empty conversation.
    ///
    /// Returns true when the caller should also clear the persisted id.
    pub fn fail_history_load(&mut self, epoch: Epoch) -> bool {
        if !self.settle(epoch) {
            return false;
        }
        self.messages.clear();
        self.session_id = None;
        true
    }

    /// Optimistically append the user's message and mark a send as in flight.
    ///
    /// Returns `None` (and changes nothing) while another request is pending or
    /// when the text is blank.
    pub fn begin_send(&mut self, text: &str, now: DateTime<Utc>) -> Option<SendRequest> {
        if self.loading || text.trim().is_empty() {
            return None;
        }
        self.error = None;
        self.messages.push(Message::user(text, now));
        self.loading = true;
        Some(SendRequest {
            message: text.to_string(),
            session_id: self.session_id.clone(),
            epoch: self.current_epoch(),
        })
    }

    /// Append the assistant reply.
    ///
    /// Returns the session id the conversation just adopted, if this reply is
    /// the one that assigned it. An already assigned id is never replaced.
    pub fn complete_send(
        &mut self,
        epoch: Epoch,
        reply: ChatReply,
        now: DateTime<Utc>,
    ) -> Option<String> {
        if !self.settle(epoch) {
            return None;
        }
        let adopted = if self.session_id.is_none() {
            self.session_id = Some(reply.session_id.clone());
            Some(reply.session_id)
        } else {
            None
        };
        self.messages.push(Message::assistant(reply.reply, now));
        adopted
    }

    /// Surface a send failure in the banner and inline in the transcript
    pub fn fail_send(&mut self, epoch: Epoch, error: &str, now: DateTime<Utc>) {
        if !self.settle(epoch) {
            return;
        }
        let error = error.trim();
        self.error = Some(if error.is_empty() {
            DEFAULT_SEND_ERROR.to_string()
        } else {
            error.to_string()
        });
        self.messages.push(Message::error_notice(now));
    }

    /// Start a fresh conversation
    pub fn reset(&mut self) {
        self.messages.clear();
        self.session_id = None;
        self.error = None;
        self.epoch += 1;
    }

    /// Clear the loading flag for a finished request. Returns false when the
    /// request belonged to a conversation that has since been reset.
    fn settle(&mut self, epoch: Epoch) -> bool {
        self.loading = false;
        epoch == self.current_epoch()
    }
}
