//! The seam between [`ConnectionManager`](crate::ConnectionManager) and the
//! socket-level broker client.
//!
//! A transport owns the network connection, heart-beats and its own
//! reconnect timer.  The manager only activates/deactivates it, listens to
//! its lifecycle events, and registers topic subscriptions and publishes
//! through it.  [`StompTransport`](crate::stomp::StompTransport) is the
//! production implementation; tests plug in an in-memory one.

use crate::{
    auth::AuthToken,
    error::Result,
    event_handlers::{ConnectionError, DisconnectReason},
};
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receives the raw body of every frame delivered to one subscription.
pub type FrameSink = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle events of one activation, in the order they happened.
pub type TransportEvents = mpsc::UnboundedReceiver<TransportEvent>;

/// Lifecycle notifications emitted by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The broker accepted the first handshake of this activation.
    Connected,
    /// The broker rejected the handshake.  The transport does not retry.
    ConnectFailed(String),
    /// The connection dropped; the transport may reconnect on its own.
    Disconnected(DisconnectReason),
    /// A dropped connection was re-established by the transport.
    Reconnected,
    /// Something went wrong but the transport keeps trying.
    Error(ConnectionError),
}

/// Transport-assigned identifier of a topic subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Headers sent with the broker handshake.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectHeaders(Vec<(String, String)>);

impl ConnectHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Authorization: Bearer <token>`.
    pub fn bearer(token: &AuthToken) -> Self {
        Self::new().with("Authorization", token.bearer())
    }

    /// Add a header; an existing header with the same name is replaced.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.0.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.0.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_pairs(self) -> Vec<(String, String)> {
        self.0
    }
}

impl fmt::Debug for ConnectHeaders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, value) in &self.0 {
            if name.eq_ignore_ascii_case("authorization") {
                map.entry(name, &"***");
            } else {
                map.entry(name, value);
            }
        }
        map.finish()
    }
}

/// Socket-level broker client.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Start connecting in the background with `headers` on the handshake.
    ///
    /// Returns the event stream of this activation.  An activation that is
    /// already running is replaced.
    fn activate(&self, headers: ConnectHeaders) -> Result<TransportEvents>;

    /// Detach the active session immediately.  The returned future drives
    /// the graceful close and may be dropped without awaiting.
    fn deactivate(&self) -> BoxFuture<'static, Result<()>>;

    /// Whether frames can be sent right now.
    fn is_connected(&self) -> bool;

    /// Register a subscription to `destination`; bodies of delivered frames go to `sink`.
    async fn subscribe(&self, destination: &str, sink: FrameSink) -> Result<SubscriptionId>;

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()>;

    /// Send `body` to `destination`.
    async fn publish(&self, destination: &str, body: String) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_headers() {
        let token = AuthToken::new("tok1").unwrap();
        let headers = ConnectHeaders::bearer(&token);
        assert_eq!(headers.get("authorization"), Some("Bearer tok1"));
    }

    #[test]
    fn test_with_replaces_same_name() {
        let headers = ConnectHeaders::new()
            .with("Authorization", "Bearer a")
            .with("x-client", "cli")
            .with("authorization", "Bearer b");
        assert_eq!(headers.get("Authorization"), Some("Bearer b"));
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn test_debug_hides_token() {
        let headers = ConnectHeaders::bearer(&AuthToken::new("very-secret").unwrap());
        let debug = format!("{:?}", headers);
        assert!(!debug.contains("very-secret"));
    }
}
