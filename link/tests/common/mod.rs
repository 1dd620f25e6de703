//! Shared helpers for chat-link integration tests.
//!
//! [`MockTransport`] is an in-memory [`Transport`]: tests decide when the
//! "broker" accepts or rejects the handshake, inject inbound frames by topic
//! and inspect what was published.

#![allow(dead_code)]

use chat_link::{
    ChatLinkError, ConnectHeaders, ConnectionManager, ConnectionPhase, FrameSink, LinkTimeouts,
    Result, SubscriptionId, Transport, TransportEvent, TransportEvents,
};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct MockState {
    /// One sender per activation, oldest first.
    senders: Vec<mpsc::UnboundedSender<TransportEvent>>,
    headers: Vec<ConnectHeaders>,
    connected: bool,
    deactivations: usize,
    next_id: u64,
    subscriptions: Vec<(SubscriptionId, String, FrameSink)>,
    published: Vec<(String, String)>,
    fail_activation: Option<String>,
}

#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn activations(&self) -> usize {
        self.state.lock().senders.len()
    }

    pub fn deactivations(&self) -> usize {
        self.state.lock().deactivations
    }

    pub fn last_headers(&self) -> Option<ConnectHeaders> {
        self.state.lock().headers.last().cloned()
    }

    /// Make the next `activate()` return an error.
    pub fn fail_next_activation(&self, reason: &str) {
        self.state.lock().fail_activation = Some(reason.to_string());
    }

    /// Emit `event` on the activation with index `activation` (0-based).
    pub fn emit_on(&self, activation: usize, event: TransportEvent) {
        let mut state = self.state.lock();
        let is_latest = activation + 1 == state.senders.len();
        if is_latest {
            match &event {
                TransportEvent::Connected | TransportEvent::Reconnected => state.connected = true,
                TransportEvent::ConnectFailed(_) | TransportEvent::Disconnected(_) => {
                    state.connected = false
                },
                TransportEvent::Error(e) if !e.recoverable => state.connected = false,
                TransportEvent::Error(_) => {},
            }
        }
        if let Some(tx) = state.senders.get(activation) {
            let _ = tx.send(event);
        }
    }

    pub fn emit(&self, event: TransportEvent) {
        let latest = self.activations().saturating_sub(1);
        self.emit_on(latest, event);
    }

    pub fn succeed(&self) {
        self.emit(TransportEvent::Connected);
    }

    pub fn fail(&self, reason: &str) {
        self.emit(TransportEvent::ConnectFailed(reason.to_string()));
    }

    /// Push `body` to every subscription on `topic`.  Returns how many sinks ran.
    pub fn deliver(&self, topic: &str, body: &str) -> usize {
        let sinks: Vec<FrameSink> = self
            .state
            .lock()
            .subscriptions
            .iter()
            .filter(|(_, t, _)| t == topic)
            .map(|(_, _, sink)| sink.clone())
            .collect();
        for sink in &sinks {
            sink(body);
        }
        sinks.len()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().published.clone()
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    fn activate(&self, headers: ConnectHeaders) -> Result<TransportEvents> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_activation.take() {
            return Err(ChatLinkError::WebSocketError(reason));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.senders.push(tx);
        state.headers.push(headers);
        state.connected = false;
        Ok(rx)
    }

    fn deactivate(&self) -> BoxFuture<'static, Result<()>> {
        let mut state = self.state.lock();
        state.deactivations += 1;
        state.connected = false;
        state.subscriptions.clear();
        async { Ok(()) }.boxed()
    }

    fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    async fn subscribe(&self, destination: &str, sink: FrameSink) -> Result<SubscriptionId> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ChatLinkError::NotConnected);
        }
        state.next_id += 1;
        let id = SubscriptionId(format!("mock-{}", state.next_id));
        state
            .subscriptions
            .push((id.clone(), destination.to_string(), sink));
        Ok(id)
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        self.state.lock().subscriptions.retain(|(sid, _, _)| sid != id);
        Ok(())
    }

    async fn publish(&self, destination: &str, body: String) -> Result<()> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(ChatLinkError::NotConnected);
        }
        state.published.push((destination.to_string(), body));
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn manager_with(transport: Arc<MockTransport>, timeouts: LinkTimeouts) -> ConnectionManager {
    init_logging();
    ConnectionManager::builder()
        .transport(transport)
        .timeouts(timeouts)
        .build()
        .expect("manager with mock transport")
}

pub fn manager(transport: Arc<MockTransport>) -> ConnectionManager {
    manager_with(transport, LinkTimeouts::default())
}

/// Let spawned tasks run until they block.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub async fn wait_for_phase(manager: &ConnectionManager, phase: ConnectionPhase) {
    for _ in 0..500 {
        if manager.phase() == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for phase {}, still {}", phase, manager.phase());
}
