//! Error types for chat-cli
//!
//! Provides user-friendly error messages for common CLI failures.

use chat_link::ChatLinkError;
use std::fmt;

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CLIError>;

/// Errors that can occur in the CLI
#[derive(Debug)]
pub enum CLIError {
    /// Error from chat-link library
    LinkError(ChatLinkError),

    /// Configuration file error
    ConfigurationError(String),

    /// File I/O error
    FileError(String),

    /// Invalid `--body` JSON
    ParseError(String),

    /// No topic could be subscribed
    SubscriptionError(String),
}

impl CLIError {
    fn format_link_error(err: &ChatLinkError) -> String {
        match err {
            ChatLinkError::WebSocketError(msg) => Self::clean_nested_message(msg),
            ChatLinkError::AuthenticationError(msg) => msg.clone(),
            ChatLinkError::ConfigurationError(msg) => msg.clone(),
            ChatLinkError::TimeoutError(msg) => msg.clone(),
            ChatLinkError::SerializationError(msg) => msg.clone(),
            ChatLinkError::ProtocolError(msg) => format!("Broker protocol error: {}", msg),
            ChatLinkError::NotConnected => "Not connected to the broker".to_string(),
            ChatLinkError::InternalError(msg) => msg.clone(),
        }
    }

    fn clean_nested_message(message: &str) -> String {
        let mut cleaned = message.trim();
        let prefixes = ["Connection failed:", "connection failed:", "WebSocket error:"];

        loop {
            let mut stripped = false;
            for prefix in &prefixes {
                if let Some(rest) = cleaned.strip_prefix(prefix) {
                    cleaned = rest.trim_start();
                    stripped = true;
                    break;
                }
            }

            if !stripped {
                break;
            }
        }

        cleaned.to_string()
    }
}

impl fmt::Display for CLIError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CLIError::LinkError(e) => write!(f, "{}", Self::format_link_error(e)),
            CLIError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            CLIError::FileError(msg) => write!(f, "File error: {}", msg),
            CLIError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            CLIError::SubscriptionError(msg) => write!(f, "Subscription error: {}", msg),
        }
    }
}

impl std::error::Error for CLIError {}

impl From<ChatLinkError> for CLIError {
    fn from(err: ChatLinkError) -> Self {
        CLIError::LinkError(err)
    }
}

impl From<std::io::Error> for CLIError {
    fn from(err: std::io::Error) -> Self {
        CLIError::FileError(err.to_string())
    }
}

impl From<toml::de::Error> for CLIError {
    fn from(err: toml::de::Error) -> Self {
        CLIError::ConfigurationError(format!("TOML parse error: {}", err))
    }
}

impl From<serde_json::Error> for CLIError {
    fn from(err: serde_json::Error) -> Self {
        CLIError::ParseError(format!("Invalid JSON: {}", err))
    }
}
