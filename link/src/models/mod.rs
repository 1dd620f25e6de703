//! Data models for chat-link.
//!
//! Connection options plus the JSON payloads the chat server publishes on
//! its topics.  The connection manager itself never looks at payloads; these
//! types are for callers using [`ConnectionManager::subscribe_json`](crate::ConnectionManager::subscribe_json).

pub mod chat;
pub mod chat_message;
pub mod commands;
pub mod connection_options;
pub mod live_events;
pub mod user_summary;


pub use chat::{Chat, ChatType};
pub use chat_message::ChatMessage;
pub use commands::{MarkReadCommand, SendMessageCommand, TEXT_MESSAGE_TYPE};
pub use connection_options::ConnectionOptions;
pub use live_events::{PresenceUpdate, ReadReceipt, TypingEvent};
pub use user_summary::UserSummary;
