//! Connection lifecycle core.
//!
//! [`ConnectionManager`] owns one logical broker connection and multiplexes
//! topic subscriptions and publishes over it.  Callers may subscribe or
//! publish before the connection is ready: every such call waits on the
//! readiness latch of the current connect attempt and proceeds (or gives up)
//! once that attempt settles.

use crate::{
    auth::AuthToken,
    error::{ChatLinkError, Result},
    event_handlers::{ConnectionError, DisconnectReason, EventHandlers},
    latch::{Readiness, ReadinessLatch, ReadinessSignal},
    models::ConnectionOptions,
    stomp::StompTransport,
    timeouts::LinkTimeouts,
    transport::{ConnectHeaders, FrameSink, SubscriptionId, Transport, TransportEvent, TransportEvents},
};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use tokio::task::JoinHandle;

/// Lifecycle phase of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Connected,
    Failed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Idle => "idle",
            ConnectionPhase::Connecting => "connecting",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct State {
    phase: ConnectionPhase,
    token: Option<AuthToken>,
    /// Latch generation owned by the current activation.
    attempt: u64,
    pump: Option<JoinHandle<()>>,
}

struct Inner {
    endpoint: Option<String>,
    timeouts: LinkTimeouts,
    event_handlers: EventHandlers,
    transport: Arc<dyn Transport>,
    latch: ReadinessLatch,
    state: Mutex<State>,
}

/// Handle to the shared connection.  Clones share the same connection.
///
/// # Example
///
/// ```rust,no_run
/// use chat_link::models::SendMessageCommand;
/// use chat_link::{topics, ConnectionManager};
///
/// # async fn example() -> chat_link::Result<()> {
/// let manager = ConnectionManager::builder()
///     .endpoint("ws://localhost:8080/ws")
///     .build()?;
///
/// manager.connect("eyJhbGciOi...")?;
///
/// let sub = manager
///     .subscribe(&topics::chat_messages(42), |payload| println!("{}", payload))
///     .await;
///
/// manager
///     .publish(
///         &topics::destinations::send_message(42),
///         &SendMessageCommand::text("hi"),
///     )
///     .await;
///
/// if let Some(sub) = sub {
///     sub.unsubscribe().await;
/// }
/// manager.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("phase", &state.phase)
            .field("token", &state.token)
            .field("latch", &self.inner.latch)
            .finish()
    }
}

impl ConnectionManager {
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.inner.endpoint.as_deref()
    }

    pub fn timeouts(&self) -> &LinkTimeouts {
        &self.inner.timeouts
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.inner.state.lock().phase
    }

    /// `true` when the current attempt succeeded and the transport can send.
    pub fn is_connected(&self) -> bool {
        self.phase() == ConnectionPhase::Connected && self.inner.transport.is_connected()
    }

    pub fn has_token(&self) -> bool {
        self.inner.state.lock().token.is_some()
    }

    /// Start connecting with `token`.
    ///
    /// No-op while already connecting or connected.  The outcome is observed
    /// through [`subscribe`](Self::subscribe)/[`publish`](Self::publish) and the
    /// event handlers; activation failures never surface here.
    ///
    /// # Errors
    ///
    /// `ConfigurationError` if `token` is empty.
    pub fn connect(&self, token: impl Into<String>) -> Result<()> {
        let token = AuthToken::new(token)?;
        let inner = &self.inner;
        let mut state = inner.state.lock();

        match state.phase {
            ConnectionPhase::Connecting | ConnectionPhase::Connected => {
                log::debug!("[chat-link] connect() ignored: already {}", state.phase);
                return Ok(());
            },
            ConnectionPhase::Failed => {
                inner.latch.rearm_if_failed(inner.latch.generation());
            },
            ConnectionPhase::Idle => {},
        }

        let generation = inner.latch.generation();
        state.phase = ConnectionPhase::Connecting;
        state.attempt = generation;
        state.token = Some(token.clone());

        log::info!(
            "[chat-link] Connecting to {} (token {})",
            inner.endpoint.as_deref().unwrap_or("<custom transport>"),
            token.redacted()
        );

        let activation = tokio::runtime::Handle::try_current()
            .map_err(|_| {
                ChatLinkError::ConfigurationError(
                    "connect() must be called inside a Tokio runtime".to_string(),
                )
            })
            .and_then(|runtime| {
                let events = inner.transport.activate(ConnectHeaders::bearer(&token))?;
                Ok(runtime.spawn(pump_events(Arc::downgrade(inner), generation, events)))
            });

        match activation {
            Ok(pump) => {
                if let Some(old) = state.pump.replace(pump) {
                    old.abort();
                }
            },
            Err(e) => {
                log::error!("[chat-link] Transport activation failed: {}", e);
                state.phase = ConnectionPhase::Failed;
                inner.latch.reject(generation, e.to_string());
                drop(state);
                inner.event_handlers.emit_error(ConnectionError::new(e.to_string(), false));
            },
        }

        Ok(())
    }

    /// Tear down the connection and reset to `Idle`.
    ///
    /// Safe to call repeatedly or without a prior `connect()`.  Calls still
    /// waiting on the old attempt are released with a failure.
    pub async fn disconnect(&self) {
        let inner = &self.inner;
        let (was, deactivation) = {
            let mut state = inner.state.lock();
            let was = state.phase;
            state.phase = ConnectionPhase::Idle;
            state.token = None;
            state.attempt = inner.latch.rearm();
            if let Some(pump) = state.pump.take() {
                pump.abort();
            }
            let deactivation = (was != ConnectionPhase::Idle).then(|| inner.transport.deactivate());
            (was, deactivation)
        };

        if let Some(deactivation) = deactivation {
            log::info!("[chat-link] Disconnecting (was {})", was);
            if let Err(e) = deactivation.await {
                log::warn!("[chat-link] Transport deactivation failed: {}", e);
            }
        }

        if was == ConnectionPhase::Connected {
            inner
                .event_handlers
                .emit_disconnect(DisconnectReason::new("Client disconnected"));
        }
    }

    /// Subscribe `handler` to `topic`; each frame body is parsed as JSON first.
    ///
    /// Waits for the current connect attempt.  Returns `None` if it failed,
    /// did not settle within [`LinkTimeouts::ready_timeout`], or the transport
    /// refused the subscription.  Frames that are not valid JSON are logged
    /// and dropped.
    pub async fn subscribe<F>(&self, topic: &str, handler: F) -> Option<Subscription>
    where
        F: Fn(serde_json::Value) + Send + Sync + 'static,
    {
        let owned_topic = topic.to_string();
        self.register(topic, move |body: &str| {
            match serde_json::from_str::<serde_json::Value>(body) {
                Ok(payload) => handler(payload),
                Err(e) => {
                    log::warn!("[chat-link] Dropping malformed frame on {}: {}", owned_topic, e)
                },
            }
        })
        .await
    }

    /// Like [`subscribe`](Self::subscribe) with payloads deserialized into `T`.
    /// Frames that do not match `T` are logged and dropped.
    pub async fn subscribe_json<T, F>(&self, topic: &str, handler: F) -> Option<Subscription>
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let owned_topic = topic.to_string();
        self.register(topic, move |body: &str| match serde_json::from_str::<T>(body) {
            Ok(payload) => handler(payload),
            Err(e) => log::warn!(
                "[chat-link] Dropping frame on {} that does not match {}: {}",
                owned_topic,
                std::any::type_name::<T>(),
                e
            ),
        })
        .await
    }

    async fn register<F>(&self, topic: &str, deliver: F) -> Option<Subscription>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if topic.is_empty() {
            log::warn!("[chat-link] subscribe() called with an empty topic");
            return None;
        }

        let signal = self.inner.latch.signal();
        if !self.await_ready(signal, "subscribe", topic).await {
            return None;
        }

        let active = Arc::new(AtomicBool::new(true));
        let gate = active.clone();
        let sink: FrameSink = Arc::new(move |body: &str| {
            if gate.load(Ordering::Acquire) {
                deliver(body);
            }
        });

        match self.inner.transport.subscribe(topic, sink).await {
            Ok(id) => {
                log::debug!("[chat-link] Subscribed to {} ({})", topic, id);
                Some(Subscription {
                    id,
                    topic: topic.to_string(),
                    active,
                    transport: self.inner.transport.clone(),
                })
            },
            Err(e) => {
                log::error!("[chat-link] Failed to subscribe to {}: {}", topic, e);
                None
            },
        }
    }

    /// Serialize `payload` and send it to `destination`.
    ///
    /// Best effort: waits for the current connect attempt, then sends.  If the
    /// connection is not usable the message is logged and dropped.
    pub async fn publish<T>(&self, destination: &str, payload: &T)
    where
        T: Serialize + ?Sized,
    {
        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(e) => {
                log::error!("[chat-link] Cannot serialize payload for {}: {}", destination, e);
                return;
            },
        };

        let signal = self.inner.latch.signal();
        if !self.await_ready(signal, "publish", destination).await {
            log::error!("[chat-link] Not connected; dropping message to {}", destination);
            return;
        }

        if let Err(e) = self.inner.transport.publish(destination, body).await {
            log::error!("[chat-link] Dropping message to {}: {}", destination, e);
        }
    }

    async fn await_ready(&self, signal: ReadinessSignal, op: &str, target: &str) -> bool {
        let generation = signal.generation();
        let limit = self.inner.timeouts.ready_timeout;

        let outcome = if LinkTimeouts::is_no_timeout(limit) {
            Some(signal.wait().await)
        } else {
            signal.wait_timeout(limit).await
        };

        match outcome {
            Some(Readiness::Ready) => true,
            Some(Readiness::Failed(reason)) => {
                log::warn!("[chat-link] {} {} aborted: connection failed ({})", op, target, reason);
                if self.inner.latch.rearm_if_failed(generation) {
                    log::debug!("[chat-link] Readiness reset after failed attempt {}", generation);
                }
                false
            },
            Some(Readiness::Pending) | None => {
                log::warn!(
                    "[chat-link] {} {} aborted: connection not ready within {:?}",
                    op,
                    target,
                    limit
                );
                false
            },
        }
    }
}

/// Applies one activation's events to the shared state, then forwards them
/// to the event handlers.  Exits once the activation is no longer current.
async fn pump_events(inner: Weak<Inner>, generation: u64, mut events: TransportEvents) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if !inner.apply(generation, &event) {
            log::debug!("[chat-link] Ignoring {:?} from stale attempt {}", event, generation);
            break;
        }
        inner.dispatch(event);
    }
}

impl Inner {
    fn apply(&self, generation: u64, event: &TransportEvent) -> bool {
        let mut state = self.state.lock();
        if state.attempt != generation || state.phase == ConnectionPhase::Idle {
            return false;
        }

        match event {
            TransportEvent::Connected | TransportEvent::Reconnected => {
                state.phase = ConnectionPhase::Connected;
                self.latch.resolve(generation);
            },
            TransportEvent::ConnectFailed(reason) => {
                state.phase = ConnectionPhase::Failed;
                self.latch.reject(generation, reason.clone());
            },
            TransportEvent::Disconnected(reason) => {
                log::info!("[chat-link] Connection dropped: {}", reason);
            },
            TransportEvent::Error(error) if !error.recoverable => {
                if state.phase == ConnectionPhase::Connected {
                    // The transport gave up; later calls must see a failed attempt.
                    let next = self.latch.rearm();
                    self.latch.reject(next, error.message.clone());
                    state.attempt = next;
                } else {
                    self.latch.reject(generation, error.message.clone());
                }
                state.phase = ConnectionPhase::Failed;
            },
            TransportEvent::Error(_) => {},
        }
        true
    }

    fn dispatch(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => {
                log::info!("[chat-link] Connected");
                self.event_handlers.emit_connect();
            },
            TransportEvent::Reconnected => {
                log::info!("[chat-link] Reconnected");
                self.event_handlers.emit_reconnect();
            },
            TransportEvent::ConnectFailed(reason) => {
                log::error!("[chat-link] Connect failed: {}", reason);
                self.event_handlers.emit_error(ConnectionError::new(reason, false));
            },
            TransportEvent::Disconnected(reason) => self.event_handlers.emit_disconnect(reason),
            TransportEvent::Error(error) => self.event_handlers.emit_error(error),
        }
    }
}

/// Capability returned by a successful subscribe.
///
/// Dropping it does not unsubscribe; call [`unsubscribe`](Self::unsubscribe).
pub struct Subscription {
    id: SubscriptionId,
    topic: String,
    active: Arc<AtomicBool>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery and release the subscription on the broker.  Idempotent.
    pub async fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.transport.unsubscribe(&self.id).await {
            log::warn!("[chat-link] Failed to unsubscribe from {}: {}", self.topic, e);
        }
    }
}

/// Builder for [`ConnectionManager`].
#[derive(Default)]
pub struct ConnectionManagerBuilder {
    endpoint: Option<String>,
    options: ConnectionOptions,
    timeouts: LinkTimeouts,
    event_handlers: EventHandlers,
    transport: Option<Arc<dyn Transport>>,
}

impl ConnectionManagerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Broker WebSocket URL (`ws://` or `wss://`).
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn timeouts(mut self, timeouts: LinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Use a custom transport instead of [`StompTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<ConnectionManager> {
        if let Some(url) = &self.endpoint {
            if !(url.starts_with("ws://") || url.starts_with("wss://")) {
                return Err(ChatLinkError::ConfigurationError(format!(
                    "Broker endpoint must start with ws:// or wss://, got '{}'",
                    url
                )));
            }
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let url = self.endpoint.clone().ok_or_else(|| {
                    ChatLinkError::ConfigurationError("endpoint is required".to_string())
                })?;
                Arc::new(StompTransport::new(
                    url,
                    self.options,
                    self.timeouts.clone(),
                    self.event_handlers.clone(),
                )) as Arc<dyn Transport>
            },
        };

        Ok(ConnectionManager {
            inner: Arc::new(Inner {
                endpoint: self.endpoint,
                timeouts: self.timeouts,
                event_handlers: self.event_handlers,
                transport,
                latch: ReadinessLatch::new(),
                state: Mutex::new(State {
                    phase: ConnectionPhase::Idle,
                    token: None,
                    attempt: 0,
                    pump: None,
                }),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_endpoint_without_transport() {
        let err = ConnectionManager::builder().build().unwrap_err();
        assert!(matches!(err, ChatLinkError::ConfigurationError(_)));
    }

    #[test]
    fn test_builder_rejects_http_endpoint() {
        let err = ConnectionManager::builder()
            .endpoint("http://localhost:8080/ws")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ws://"));
    }

    #[test]
    fn test_new_manager_is_idle() {
        let manager = ConnectionManager::builder()
            .endpoint("ws://localhost:8080/ws")
            .build()
            .unwrap();
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
        assert!(!manager.is_connected());
        assert!(!manager.has_token());
        assert_eq!(manager.endpoint(), Some("ws://localhost:8080/ws"));
    }

    #[test]
    fn test_connect_rejects_empty_token() {
        let manager = ConnectionManager::builder()
            .endpoint("ws://localhost:8080/ws")
            .build()
            .unwrap();
        assert!(matches!(
            manager.connect("  "),
            Err(ChatLinkError::ConfigurationError(_))
        ));
        assert_eq!(manager.phase(), ConnectionPhase::Idle);
    }

    #[test]
    fn test_connect_outside_runtime_fails_attempt() {
        let manager = ConnectionManager::builder()
            .endpoint("ws://localhost:8080/ws")
            .build()
            .unwrap();
        manager.connect("tok1").unwrap();
        assert_eq!(manager.phase(), ConnectionPhase::Failed);
        assert!(manager.has_token());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ConnectionPhase::Connecting.to_string(), "connecting");
    }
}
