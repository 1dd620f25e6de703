use serde::{Deserialize, Serialize};

use super::user_summary::UserSummary;

/// A message delivered on a chat topic.
///
/// `timestamp` is kept as the ISO 8601 string the server sends; this crate
/// does not interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub content: String,
    pub timestamp: String,
    pub author: UserSummary,
    /// Chat the message belongs to, when the producer includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
}
