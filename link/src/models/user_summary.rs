use serde::{Deserialize, Serialize};

/// Compact user reference embedded in messages and chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
}
