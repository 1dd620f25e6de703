//! Credential handling for the broker handshake.
//!
//! The token is treated as an opaque string.  It is attached to the STOMP
//! `CONNECT` frame as `Authorization: Bearer <token>` and is never logged in
//! full: both `Debug` and `Display` print a redacted form.

use crate::error::{ChatLinkError, Result};
use std::fmt;

/// Number of leading characters kept when a token is rendered for logs.
const REDACTED_PREFIX_CHARS: usize = 4;

/// Bearer credential supplied to [`ConnectionManager::connect`](crate::ConnectionManager::connect).
///
/// # Examples
///
/// ```rust
/// use chat_link::AuthToken;
///
/// let token = AuthToken::new("eyJhbGciOiJIUzI1NiJ9.payload.sig").unwrap();
/// assert_eq!(token.bearer(), "Bearer eyJhbGciOiJIUzI1NiJ9.payload.sig");
/// assert_eq!(token.to_string(), "eyJh…");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Wrap a raw token.  Empty or whitespace-only tokens are rejected.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(ChatLinkError::ConfigurationError(
                "Auth token must not be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Redacted form safe for logs.
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(REDACTED_PREFIX_CHARS).collect();
        format!("{}…", prefix)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AuthToken").field(&self.redacted()).finish()
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_token() {
        assert!(matches!(
            AuthToken::new(""),
            Err(ChatLinkError::ConfigurationError(_))
        ));
        assert!(AuthToken::new("   ").is_err());
    }

    #[test]
    fn test_bearer_header_value() {
        let token = AuthToken::new("abc.def.ghi").unwrap();
        assert_eq!(token.bearer(), "Bearer abc.def.ghi");
        // The bearer value is the only way to read the raw token back.
        assert_eq!(token.bearer().strip_prefix("Bearer "), Some("abc.def.ghi"));
    }

    #[test]
    fn test_debug_and_display_are_redacted() {
        let token = AuthToken::new("supersecretvalue").unwrap();
        let debug = format!("{:?}", token);
        let display = format!("{}", token);
        assert!(!debug.contains("supersecretvalue"));
        assert!(!display.contains("supersecretvalue"));
        assert_eq!(display, "supe…");
    }

    #[test]
    fn test_short_token_redaction() {
        let token = AuthToken::new("ab").unwrap();
        assert_eq!(token.redacted(), "ab…");
    }
}
