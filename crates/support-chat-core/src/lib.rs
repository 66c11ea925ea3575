pub mod api;
pub mod config;
pub mod error;
pub mod format;
pub mod message;
pub mod session;
pub mod state;
pub mod widget;

// Re-export main types for convenience
pub use api::{ChatApiClient, ChatBackend, ChatReply};
pub use config::Config;
pub use error::{ApiError, StoreError};
pub use message::{Message, Sender};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore};
pub use state::{ChatState, Epoch, HistoryRequest, SendRequest};
pub use widget::ChatWidget;
