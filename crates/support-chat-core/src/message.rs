//! Chat message types shared by every front end
//!
//! Messages are immutable once created. User messages and assistant replies are
//! minted client-side with time-derived ids; history entries keep the id the
//! backend assigned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Text of the synthetic assistant message appended when a send fails
pub const ERROR_NOTICE_TEXT: &str = "❌ Sorry, I encountered an error. Please try again.";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

impl Sender {
    /// Map a backend role string onto a sender. Anything other than `user` is
    /// treated as the assistant.
    pub fn from_role(role: &str) -> Self {
        if role == "user" {
            Sender::User
        } else {
            Sender::Ai
        }
    }
}

/// A single entry in the conversation transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A message typed by the local user
    pub fn user(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::minted("user", Sender::User, text.into(), now)
    }

    /// A reply from the assistant
    pub fn assistant(text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self::minted("ai", Sender::Ai, text.into(), now)
    }

    /// The inline notice shown in the transcript after a failed send
    pub fn error_notice(now: DateTime<Utc>) -> Self {
        Self::minted("error", Sender::Ai, ERROR_NOTICE_TEXT.to_string(), now)
    }

    pub fn is_from_user(&self) -> bool {
        self.sender == Sender::User
    }

    fn minted(prefix: &str, sender: Sender, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", prefix, now.timestamp_millis()),
            sender,
            text,
            created_at: now,
        }
    }
}
