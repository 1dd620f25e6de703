//! Topic and destination names used by the chat server.
//!
//! The naming scheme is owned by the server.  These helpers only build the
//! strings; [`ConnectionManager`](crate::ConnectionManager) treats every
//! topic and destination as opaque.

/// Application prefix for inbound commands handled by the server.
pub const APP_PREFIX: &str = "/app";

/// Broadcast prefix for server-published topics.
pub const TOPIC_PREFIX: &str = "/topic";

/// Per-user queue prefix; the broker resolves it to the authenticated user.
pub const USER_QUEUE_PREFIX: &str = "/user/queue";

/// New messages in a chat.
pub fn chat_messages(chat_id: i64) -> String {
    format!("{}/chats.{}", TOPIC_PREFIX, chat_id)
}

/// Typing indicators in a chat.
pub fn chat_typing(chat_id: i64) -> String {
    format!("{}/chats.{}.typing", TOPIC_PREFIX, chat_id)
}

/// Read receipts in a chat.
pub fn chat_read_receipts(chat_id: i64) -> String {
    format!("{}/chats.{}.read", TOPIC_PREFIX, chat_id)
}

/// Online/offline status of all users.
pub fn presence() -> String {
    format!("{}/presence", TOPIC_PREFIX)
}

/// Chats created with the current user as a participant.
pub fn user_new_chats() -> String {
    format!("{}/chats", USER_QUEUE_PREFIX)
}

/// Profile changes (username, avatar) of any user.
pub fn user_updates() -> String {
    format!("{}/users.updates", TOPIC_PREFIX)
}

/// Every live topic of one chat, in subscription order.
pub fn chat_topics(chat_id: i64) -> [String; 3] {
    [
        chat_messages(chat_id),
        chat_typing(chat_id),
        chat_read_receipts(chat_id),
    ]
}

/// Outbound command destinations.
pub mod destinations {
    use super::APP_PREFIX;

    /// Post a message to a chat. Body: [`SendMessageCommand`](crate::models::SendMessageCommand).
    pub fn send_message(chat_id: i64) -> String {
        format!("{}/chat.sendMessage/{}", APP_PREFIX, chat_id)
    }

    /// Mark a chat read up to its latest message. Body: `{}`.
    pub fn mark_read(chat_id: i64) -> String {
        format!("{}/chat.read/{}", APP_PREFIX, chat_id)
    }
}

/// Extract the chat id from a topic built by [`chat_messages`],
/// [`chat_typing`] or [`chat_read_receipts`].
pub fn chat_id_from_topic(topic: &str) -> Option<i64> {
    let rest = topic.strip_prefix(TOPIC_PREFIX)?.strip_prefix("/chats.")?;
    let id = rest.split('.').next()?;
    id.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_topics() {
        assert_eq!(chat_messages(12), "/topic/chats.12");
        assert_eq!(chat_typing(12), "/topic/chats.12.typing");
        assert_eq!(chat_read_receipts(12), "/topic/chats.12.read");
        assert_eq!(
            chat_topics(3),
            [
                "/topic/chats.3".to_string(),
                "/topic/chats.3.typing".to_string(),
                "/topic/chats.3.read".to_string()
            ]
        );
    }

    #[test]
    fn test_global_topics_and_destinations() {
        assert_eq!(presence(), "/topic/presence");
        assert_eq!(user_new_chats(), "/user/queue/chats");
        assert_eq!(user_updates(), "/topic/users.updates");
        assert_eq!(destinations::send_message(42), "/app/chat.sendMessage/42");
        assert_eq!(destinations::mark_read(42), "/app/chat.read/42");
    }

    #[test]
    fn test_chat_id_from_topic() {
        assert_eq!(chat_id_from_topic("/topic/chats.77"), Some(77));
        assert_eq!(chat_id_from_topic("/topic/chats.77.typing"), Some(77));
        assert_eq!(chat_id_from_topic("/topic/presence"), None);
        assert_eq!(chat_id_from_topic("/topic/chats.abc"), None);
    }
}
