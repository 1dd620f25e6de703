use serde::{Deserialize, Serialize};

/// Message type the server stores with a plain text message.
pub const TEXT_MESSAGE_TYPE: &str = "TEXT";

/// Body for `/app/chat.sendMessage/<chatId>`.
///
/// The chat is addressed by the destination, not the body.  `message_type`
/// is `TEXT` for plain messages or the media kind (`IMAGE`, `VIDEO`,
/// `AUDIO`, `FILE`) when `content` names an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageCommand {
    pub content: String,
    #[serde(rename = "type", default = "default_message_type")]
    pub message_type: String,
}

fn default_message_type() -> String {
    TEXT_MESSAGE_TYPE.to_string()
}

impl SendMessageCommand {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: default_message_type(),
        }
    }

    /// An uploaded file; `file_name` is what the upload endpoint returned.
    pub fn media(file_name: impl Into<String>, media_type: impl Into<String>) -> Self {
        Self {
            content: file_name.into(),
            message_type: media_type.into(),
        }
    }
}

/// Body for `/app/chat.read/<chatId>`. Always an empty object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReadCommand {}
