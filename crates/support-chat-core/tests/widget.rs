//! Orchestration behaviour of `ChatWidget` against scripted fakes

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use support_chat_core::message::ERROR_NOTICE_TEXT;
use support_chat_core::{
    ApiError, ChatBackend, ChatReply, ChatWidget, MemorySessionStore, Message, Sender,
    SessionStore,
};

#[derive(Default)]
struct FakeBackend {
    replies: Mutex<VecDeque<Result<ChatReply, ApiError>>>,
    history: Mutex<Option<Result<Vec<Message>, ApiError>>>,
    sent: Mutex<Vec<(String, Option<String>)>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn reply(self, session_id: &str, text: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(ChatReply {
            session_id: session_id.to_string(),
            reply: text.to_string(),
        }));
        self
    }

    fn failure(self, message: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(ApiError::Status {
            status: 500,
            message: message.to_string(),
        }));
        self
    }

    fn history(self, result: Result<Vec<Message>, ApiError>) -> Self {
        *self.history.lock().unwrap() = Some(result);
        self
    }

    fn sent(&self) -> Vec<(String, Option<String>)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn send_message(
        &self,
        message: &str,
        session_id: Option<&str>,
    ) -> Result<ChatReply, ApiError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), session_id.map(str::to_string)));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("unexpected send")
    }

    async fn get_conversation(&self, session_id: &str) -> Result<Vec<Message>, ApiError> {
        self.fetched.lock().unwrap().push(session_id.to_string());
        self.history
            .lock()
            .unwrap()
            .take()
            .expect("unexpected history fetch")
    }
}

fn widget(
    backend: FakeBackend,
    store: MemorySessionStore,
) -> (ChatWidget, Arc<FakeBackend>, Arc<MemorySessionStore>) {
    let backend = Arc::new(backend);
    let store = Arc::new(store);
    let widget = ChatWidget::new(backend.clone(), Box::new(store.clone()));
    (widget, backend, store)
}

fn history_message(id: &str, sender: Sender, text: &str, secs: i64) -> Message {
    Message {
        id: id.to_string(),
        sender,
        text: text.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
    }
}

#[tokio::test]
async fn first_send_persists_new_session() {
    let backend = FakeBackend::default().reply("conv-1", "Returns take 30 days.");
    let (mut widget, backend, store) = widget(backend, MemorySessionStore::new());

    assert!(widget.send("What is the return policy?").await);

    let state = widget.state();
    let texts: Vec<&str> = state.messages().iter().map(|m| m.text.as_str()).collect();
    assert_eq!(texts, vec!["What is the return policy?", "Returns take 30 days."]);
    assert_eq!(state.messages()[0].sender, Sender::User);
    assert_eq!(state.messages()[1].sender, Sender::Ai);
    assert_eq!(state.session_id(), Some("conv-1"));
    assert_eq!(state.error(), None);
    assert!(!state.is_loading());
    assert_eq!(store.current().as_deref(), Some("conv-1"));
    assert_eq!(backend.sent(), vec![("What is the return policy?".to_string(), None)]);
}

#[tokio::test]
async fn later_sends_reuse_session() {
    let backend = FakeBackend::default()
        .reply("conv-1", "a")
        .reply("conv-1", "b");
    let (mut widget, backend, _store) = widget(backend, MemorySessionStore::new());

    widget.send("one").await;
    widget.send("two").await;

    assert_eq!(widget.state().messages().len(), 4);
    assert_eq!(backend.sent()[1], ("two".to_string(), Some("conv-1".to_string())));
}

#[tokio::test]
async fn failed_send_shows_error_and_notice() {
    let backend = FakeBackend::default().failure("Message is required");
    let (mut widget, _backend, store) = widget(backend, MemorySessionStore::new());

    assert!(widget.send("hello").await);

    let state = widget.state();
    assert_eq!(state.messages().len(), 2);
    assert_eq!(state.messages()[0].text, "hello");
    assert_eq!(state.messages()[1].text, ERROR_NOTICE_TEXT);
    assert_eq!(state.messages()[1].sender, Sender::Ai);
    assert_eq!(state.error(), Some("Message is required"));
    assert!(!state.is_loading());
    assert_eq!(state.session_id(), None);
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn send_while_pending_is_rejected() {
    let (mut widget, backend, _store) = widget(FakeBackend::default(), MemorySessionStore::new());

    let pending = widget.begin_send("first").unwrap();
    assert!(widget.begin_send("second").is_none());
    assert!(!widget.send("third").await);

    assert_eq!(widget.state().messages().len(), 1);
    assert!(backend.sent().is_empty());
    assert!(widget.state().is_loading());

    widget.finish_send(
        pending.epoch,
        Ok(ChatReply {
            session_id: "conv-2".to_string(),
            reply: "ok".to_string(),
        }),
    );
    assert!(!widget.state().is_loading());
}

#[tokio::test]
async fn new_chat_clears_state_and_store() {
    let backend = FakeBackend::default()
        .reply("conv-1", "hi")
        .failure("boom");
    let (mut widget, _backend, store) = widget(backend, MemorySessionStore::new());
    widget.send("hello").await;
    widget.send("again").await;
    assert!(widget.state().error().is_some());

    widget.new_chat();

    let state = widget.state();
    assert!(state.messages().is_empty());
    assert_eq!(state.session_id(), None);
    assert_eq!(state.error(), None);
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn resume_loads_history_in_order() {
    let history = vec![
        history_message("m1", Sender::User, "Do you ship abroad?", 0),
        history_message("m2", Sender::Ai, "Yes, to 40 countries.", 2),
        history_message("m3", Sender::User, "Thanks", 5),
    ];
    let backend = FakeBackend::default().history(Ok(history.clone()));
    let (mut widget, backend, store) = widget(backend, MemorySessionStore::with_session("conv-7"));

    widget.resume().await;

    assert_eq!(widget.state().messages(), history.as_slice());
    assert_eq!(widget.state().session_id(), Some("conv-7"));
    assert!(!widget.state().is_loading());
    assert_eq!(store.current().as_deref(), Some("conv-7"));
    assert_eq!(*backend.fetched.lock().unwrap(), vec!["conv-7".to_string()]);
}

#[tokio::test]
async fn resume_failure_discards_stored_session() {
    let backend = FakeBackend::default().history(Err(ApiError::Status {
        status: 404,
        message: "Failed to fetch conversation".to_string(),
    }));
    let (mut widget, _backend, store) = widget(backend, MemorySessionStore::with_session("gone"));

    widget.resume().await;

    let state = widget.state();
    assert!(state.messages().is_empty());
    assert_eq!(state.session_id(), None);
    assert_eq!(state.error(), None);
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn resume_without_stored_session_does_nothing() {
    let (mut widget, backend, _store) = widget(FakeBackend::default(), MemorySessionStore::new());

    assert!(widget.begin_resume().is_none());
    widget.resume().await;

    assert!(widget.state().messages().is_empty());
    assert!(backend.fetched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn reply_arriving_after_new_chat_is_dropped() {
    let (mut widget, _backend, store) = widget(FakeBackend::default(), MemorySessionStore::new());

    let pending = widget.begin_send("hello").unwrap();
    widget.new_chat();
    widget.finish_send(
        pending.epoch,
        Ok(ChatReply {
            session_id: "conv-late".to_string(),
            reply: "late".to_string(),
        }),
    );

    assert!(widget.state().messages().is_empty());
    assert_eq!(widget.state().session_id(), None);
    assert_eq!(store.current(), None);
    assert!(!widget.state().is_loading());
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn history_arriving_after_new_chat_is_dropped() {
    let (mut widget, _backend, store) =
        widget(FakeBackend::default(), MemorySessionStore::with_session("conv-old"));

    let pending = widget.begin_resume().unwrap();
    widget.new_chat();
    widget.finish_resume(
        pending.epoch,
        Ok(vec![history_message("m1", Sender::User, "Old question", 0)]),
    );

    assert!(widget.state().messages().is_empty());
    assert_eq!(widget.state().session_id(), None);
    assert!(!widget.state().is_loading());
    assert_eq!(store.current(), None);
}
