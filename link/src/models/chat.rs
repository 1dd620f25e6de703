use serde::{Deserialize, Serialize};

use super::{chat_message::ChatMessage, user_summary::UserSummary};

/// Kind of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChatType {
    Direct,
    Group,
}

/// Chat summary pushed on the per-user new-chat topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    /// Direct chats have no name.
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub participants: Vec<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<ChatMessage>,
}

impl Chat {
    /// Name to show for the chat from `viewer`'s point of view: the group
    /// name, or the other participant's username for direct chats.
    pub fn display_name(&self, viewer: &str) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.participants
            .iter()
            .find(|p| p.username != viewer)
            .or_else(|| self.participants.first())
            .map(|p| p.username.clone())
            .unwrap_or_else(|| format!("chat {}", self.id))
    }
}
