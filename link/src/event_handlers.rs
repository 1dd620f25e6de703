//! Lifecycle hooks for the broker connection.
//!
//! All hooks are optional and are invoked from the connection manager's
//! event pump (lifecycle hooks) or from the transport task (raw frame hooks).
//! Hooks must not block; they run inline on the runtime.
//!
//! ```rust,no_run
//! use chat_link::{ConnectionManager, EventHandlers};
//!
//! # fn example() -> chat_link::Result<()> {
//! let handlers = EventHandlers::new()
//!     .on_connect(|| log::info!("broker connected"))
//!     .on_disconnect(|reason| log::warn!("broker lost: {}", reason))
//!     .on_error(|err| log::error!("broker error (recoverable={}): {}", err.recoverable, err));
//!
//! let manager = ConnectionManager::builder()
//!     .endpoint("ws://localhost:8080/ws")
//!     .event_handlers(handlers)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

/// Why the socket went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectReason {
    pub message: String,
    /// WebSocket close code when the peer sent one.
    pub code: Option<u16>,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code: {})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Error report passed to `on_error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    pub message: String,
    /// `true` when the transport will keep retrying on its own.
    pub recoverable: bool,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub type OnConnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnReconnectCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnDisconnectCallback = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(ConnectionError) + Send + Sync>;
/// Raw frame hook; receives the encoded STOMP frame text.
pub type OnFrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional callbacks for connection lifecycle events.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnectCallback>,
    pub(crate) on_reconnect: Option<OnReconnectCallback>,
    pub(crate) on_disconnect: Option<OnDisconnectCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnFrameCallback>,
    pub(crate) on_send: Option<OnFrameCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_reconnect", &self.on_reconnect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fired once per connect cycle when the broker accepts the handshake.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Fired when the transport re-established a dropped connection on its own.
    pub fn on_reconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reconnect = Some(Arc::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Debug hook for every inbound frame, heart-beats excluded.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Debug hook for every outbound frame, heart-beats excluded.
    ///
    /// `CONNECT` frames carry the bearer token; the hook receives them with
    /// the `Authorization` header already redacted.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    pub fn has_any(&self) -> bool {
        self.on_connect.is_some()
            || self.on_reconnect.is_some()
            || self.on_disconnect.is_some()
            || self.on_error.is_some()
            || self.on_receive.is_some()
            || self.on_send.is_some()
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_reconnect(&self) {
        if let Some(cb) = &self.on_reconnect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_handlers() {
        let handlers = EventHandlers::new();
        assert!(!handlers.has_any());
        // Emitting with nothing registered is a no-op.
        handlers.emit_connect();
        handlers.emit_error(ConnectionError::new("boom", true));
    }

    #[test]
    fn test_emit_dispatches_to_registered_hooks() {
        let connects = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));
        let c = connects.clone();
        let e = errors.clone();
        let handlers = EventHandlers::new()
            .on_connect(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err| {
                assert!(!err.recoverable);
                e.fetch_add(1, Ordering::SeqCst);
            });

        assert!(handlers.has_any());
        handlers.emit_connect();
        handlers.emit_connect();
        handlers.emit_error(ConnectionError::new("rejected", false));
        handlers.emit_reconnect();

        assert_eq!(connects.load(Ordering::SeqCst), 2);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::new("gone").to_string(), "gone");
        assert_eq!(
            DisconnectReason::with_code("bye", 1000).to_string(),
            "bye (code: 1000)"
        );
    }

    #[test]
    fn test_debug_shows_registration_only() {
        let handlers = EventHandlers::new().on_send(|_| {});
        let debug = format!("{:?}", handlers);
        assert!(debug.contains("on_send: true"));
        assert!(debug.contains("on_connect: false"));
    }
}
