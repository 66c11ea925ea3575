use ratatui::layout::Rect;
use support_chat_core::{ApiError, ChatReply, ChatState, ChatWidget, Epoch, Message};
use tokio::task::JoinHandle;

/// The one backend request allowed in flight, running on its own task
pub enum PendingRequest {
    Send {
        epoch: Epoch,
        task: JoinHandle<Result<ChatReply, ApiError>>,
    },
    History {
        epoch: Epoch,
        task: JoinHandle<Result<Vec<Message>, ApiError>>,
    },
}

impl PendingRequest {
    fn is_finished(&self) -> bool {
        match self {
            PendingRequest::Send { task, .. } => task.is_finished(),
            PendingRequest::History { task, .. } => task.is_finished(),
        }
    }
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub widget: ChatWidget,
    pub api_url: String,

    // Input state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Chat scroll state
    pub scroll: u16,
    pub follow_bottom: bool,
    pub chat_height: u16, // Inner height of the chat area, set during render
    pub total_lines: u16, // Rendered transcript height, set during render
    seen: (usize, bool),  // (message count, loading) at the last layout

    // Animation state
    pub animation_frame: u8, // 0-2 for the typing indicator

    pub pending: Option<PendingRequest>,

    // Chat area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
}

impl App {
    pub fn new(widget: ChatWidget, api_url: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            widget,
            api_url: api_url.into(),

            input: String::new(),
            cursor: 0,

            scroll: 0,
            follow_bottom: true,
            chat_height: 0,
            total_lines: 0,
            seen: (0, false),

            animation_frame: 0,

            pending: None,

            chat_area: None,
        }
    }

    pub fn state(&self) -> &ChatState {
        self.widget.state()
    }

    /// Kick off loading the stored conversation, if there is one
    pub fn start_resume(&mut self) {
        if let Some(request) = self.widget.begin_resume() {
            let backend = self.widget.backend();
            self.pending = Some(PendingRequest::History {
                epoch: request.epoch,
                task: tokio::spawn(async move {
                    backend.get_conversation(&request.session_id).await
                }),
            });
        }
    }

    /// Send the input box contents. The input is kept if the widget refuses it.
    pub fn submit_input(&mut self) -> bool {
        let Some(request) = self.widget.begin_send(&self.input) else {
            return false;
        };
        self.input.clear();
        self.cursor = 0;
        self.follow_bottom = true;

        let backend = self.widget.backend();
        let epoch = request.epoch;
        self.pending = Some(PendingRequest::Send {
            epoch,
            task: tokio::spawn(async move {
                backend
                    .send_message(&request.message, request.session_id.as_deref())
                    .await
            }),
        });
        true
    }

    pub fn new_chat(&mut self) {
        // A request still in flight settles against the old conversation and is dropped
        self.widget.new_chat();
        self.scroll = 0;
        self.follow_bottom = true;
    }

    /// Hand a finished request's result to the widget
    pub async fn poll_pending(&mut self) {
        if !self.pending.as_ref().is_some_and(PendingRequest::is_finished) {
            return;
        }
        match self.pending.take() {
            Some(PendingRequest::Send { epoch, task }) => {
                let result = task
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Interrupted(e.to_string())));
                self.widget.finish_send(epoch, result);
            }
            Some(PendingRequest::History { epoch, task }) => {
                let result = task
                    .await
                    .unwrap_or_else(|e| Err(ApiError::Interrupted(e.to_string())));
                self.widget.finish_resume(epoch, result);
            }
            None => {}
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.state().is_loading() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_bottom = false;
        self.scroll = self.scroll.min(self.max_scroll()).saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.max_scroll();
        self.scroll = self.scroll.saturating_add(lines).min(max);
        if self.scroll == max {
            self.follow_bottom = true;
        }
    }

    /// Record the rendered transcript size and keep the newest content in view
    /// whenever the transcript or typing indicator changes.
    pub fn update_chat_layout(&mut self, total_lines: u16, chat_height: u16) {
        self.total_lines = total_lines;
        self.chat_height = chat_height;

        let seen = (self.state().messages().len(), self.state().is_loading());
        if seen != self.seen {
            self.seen = seen;
            self.follow_bottom = true;
        }

        self.scroll = if self.follow_bottom {
            self.max_scroll()
        } else {
            self.scroll.min(self.max_scroll())
        };
    }
}
