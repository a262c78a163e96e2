//! Client side of the chat relay: sends a message, consumes the SSE reply,
//! and keeps a renderable conversation up to date.

pub mod api;
pub mod errors;
pub mod markdown;
pub mod models;
pub mod session;
pub mod state;

pub use api::RelayClient;
pub use markdown::{MarkdownRenderer, Render};
pub use models::{ConversationEntry, Role, StreamEvent};
pub use session::ChatSession;
