//! Error types for chat-link.

use thiserror::Error;

/// Result type for chat-link operations.
pub type Result<T> = std::result::Result<T, ChatLinkError>;

/// Errors surfaced by the connection manager and its transports.
///
/// Most lifecycle failures never reach callers as errors: a rejected
/// connect attempt fails the readiness signal instead, and publish/subscribe
/// degrade to "dropped" / "no subscription".  These variants are what the
/// transport seam and the builders report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatLinkError {
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Timeout: {0}")]
    TimeoutError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<serde_json::Error> for ChatLinkError {
    fn from(err: serde_json::Error) -> Self {
        ChatLinkError::SerializationError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatLinkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatLinkError::WebSocketError(err.to_string())
    }
}
