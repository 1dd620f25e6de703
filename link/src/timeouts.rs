//! Timeout configuration for the broker connection.
//!
//! `Duration::ZERO` disables a timeout, see [`LinkTimeouts::is_no_timeout`].

use std::time::Duration;

/// Timeouts applied by the connection manager and the STOMP transport.
///
/// ```rust
/// use chat_link::LinkTimeouts;
/// use std::time::Duration;
///
/// let timeouts = LinkTimeouts::builder()
///     .ready_timeout(Duration::from_secs(60))
///     .build();
/// assert_eq!(timeouts.ready_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTimeouts {
    /// WebSocket upgrade (TCP + TLS + HTTP).  Default: 10 seconds
    pub connection_timeout: Duration,

    /// Wait for `CONNECTED` after sending `CONNECT`.  Default: 5 seconds
    pub handshake_timeout: Duration,

    /// How long `subscribe`/`publish` wait for the current connect attempt
    /// to settle before giving up.  Default: 30 seconds
    pub ready_timeout: Duration,

    /// Writing a single frame to the socket.  Default: 10 seconds
    pub send_timeout: Duration,

    /// Wait for the `RECEIPT` of the `DISCONNECT` frame.  Default: 5 seconds
    pub disconnect_timeout: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connection_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            ready_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(5),
        }
    }
}

impl LinkTimeouts {
    pub fn builder() -> LinkTimeoutsBuilder {
        LinkTimeoutsBuilder::new()
    }

    /// Short timeouts for a broker on localhost.
    pub fn fast() -> Self {
        Self {
            connection_timeout: Duration::from_secs(2),
            handshake_timeout: Duration::from_secs(2),
            ready_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(2),
            disconnect_timeout: Duration::from_secs(1),
        }
    }

    /// Long timeouts for slow or lossy networks.
    pub fn relaxed() -> Self {
        Self {
            connection_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
            ready_timeout: Duration::from_secs(120),
            send_timeout: Duration::from_secs(30),
            disconnect_timeout: Duration::from_secs(10),
        }
    }

    /// Zero or absurdly large durations mean "wait forever".
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for [`LinkTimeouts`].
#[derive(Debug, Clone)]
pub struct LinkTimeoutsBuilder {
    timeouts: LinkTimeouts,
}

impl LinkTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: LinkTimeouts::default(),
        }
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connection_timeout = timeout;
        self
    }

    pub fn connection_timeout_secs(self, secs: u64) -> Self {
        self.connection_timeout(Duration::from_secs(secs))
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.handshake_timeout = timeout;
        self
    }

    pub fn handshake_timeout_secs(self, secs: u64) -> Self {
        self.handshake_timeout(Duration::from_secs(secs))
    }

    /// Set to zero to let `subscribe`/`publish` wait indefinitely.
    pub fn ready_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.ready_timeout = timeout;
        self
    }

    pub fn ready_timeout_secs(self, secs: u64) -> Self {
        self.ready_timeout(Duration::from_secs(secs))
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.send_timeout = timeout;
        self
    }

    pub fn send_timeout_secs(self, secs: u64) -> Self {
        self.send_timeout(Duration::from_secs(secs))
    }

    pub fn disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.disconnect_timeout = timeout;
        self
    }

    pub fn build(self) -> LinkTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = LinkTimeouts::default();
        assert_eq!(timeouts.connection_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.ready_timeout, Duration::from_secs(30));
        assert!(!LinkTimeouts::is_no_timeout(timeouts.ready_timeout));
    }

    #[test]
    fn test_builder() {
        let timeouts = LinkTimeouts::builder()
            .connection_timeout_secs(60)
            .ready_timeout(Duration::ZERO)
            .handshake_timeout_secs(7)
            .build();

        assert_eq!(timeouts.connection_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.handshake_timeout, Duration::from_secs(7));
        assert!(LinkTimeouts::is_no_timeout(timeouts.ready_timeout));
    }

    #[test]
    fn test_presets_are_ordered() {
        let fast = LinkTimeouts::fast();
        let relaxed = LinkTimeouts::relaxed();
        assert!(fast.ready_timeout < LinkTimeouts::default().ready_timeout);
        assert!(relaxed.ready_timeout > LinkTimeouts::default().ready_timeout);
        assert!(fast.connection_timeout <= Duration::from_secs(5));
    }

    #[test]
    fn test_huge_duration_is_no_timeout() {
        assert!(LinkTimeouts::is_no_timeout(Duration::from_secs(86400 * 366)));
        assert!(!LinkTimeouts::is_no_timeout(Duration::from_millis(1)));
    }
}
