use serde::{Deserialize, Serialize};

/// Typing indicator on `/topic/chats.<id>.typing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub chat_id: i64,
    pub username: String,
    pub is_typing: bool,
}

/// Read receipt on `/topic/chats.<id>.read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub chat_id: i64,
    pub user_id: i64,
    /// Highest message id read, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_message_id: Option<i64>,
}

/// Online/offline status change on `/topic/presence`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: i64,
    pub username: String,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}
