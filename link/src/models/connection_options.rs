use serde::{Deserialize, Serialize};

use crate::stomp::HeartBeat;

/// Connection-level options for the broker transport.
///
/// Controls the heart-beat the client offers in its `CONNECT` frame and how
/// the transport recovers from transient network loss.  Protocol-level
/// rejections (an `ERROR` frame during the handshake) are never retried.
///
/// # Example
///
/// ```rust
/// use chat_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_reconnect_delay_ms(2000)
///     .with_max_reconnect_attempts(Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Reconnect on its own after the socket drops.
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Delay before the first reconnect attempt.
    /// Doubles per attempt up to `max_reconnect_delay_ms`.
    /// Default: 5000ms
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for the reconnect delay.
    /// Default: 5000ms, which keeps the delay fixed
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Give up after this many consecutive failed attempts.
    /// Default: None (retry forever)
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Interval at which the client promises to send heart-beats.
    /// Default: 4000ms, 0 disables
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,

    /// Interval at which the client wants heart-beats from the broker.
    /// Default: 4000ms, 0 disables
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,

    /// Value of the `host` header in `CONNECT`.  Defaults to the endpoint host.
    #[serde(default)]
    pub virtual_host: Option<String>,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    5000
}

fn default_max_reconnect_delay_ms() -> u64 {
    5000
}

fn default_heartbeat_ms() -> u64 {
    4000
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            max_reconnect_attempts: None,
            heartbeat_outgoing_ms: default_heartbeat_ms(),
            heartbeat_incoming_ms: default_heartbeat_ms(),
            virtual_host: None,
        }
    }
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// `None` retries forever, `Some(0)` disables reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn with_heartbeat_ms(mut self, outgoing_ms: u64, incoming_ms: u64) -> Self {
        self.heartbeat_outgoing_ms = outgoing_ms;
        self.heartbeat_incoming_ms = incoming_ms;
        self
    }

    pub fn with_virtual_host(mut self, host: impl Into<String>) -> Self {
        self.virtual_host = Some(host.into());
        self
    }

    /// Heart-beat offered in the `CONNECT` frame.
    pub fn heartbeat(&self) -> HeartBeat {
        HeartBeat::new(self.heartbeat_outgoing_ms, self.heartbeat_incoming_ms)
    }

    /// Delay before reconnect attempt number `attempt` (0-based).
    pub fn reconnect_delay_for(&self, attempt: u32) -> u64 {
        std::cmp::min(
            self.reconnect_delay_ms
                .saturating_mul(2u64.saturating_pow(attempt)),
            self.max_reconnect_delay_ms,
        )
    }

    /// Whether attempt number `attempt` (0-based) is still allowed.
    pub fn allows_reconnect_attempt(&self, attempt: u32) -> bool {
        self.auto_reconnect && self.max_reconnect_attempts.map_or(true, |max| attempt < max)
    }
}
