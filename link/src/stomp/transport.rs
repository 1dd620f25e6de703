//! STOMP-over-WebSocket implementation of [`Transport`].
//!
//! Each activation spawns one background task that owns the socket.  The
//! public handle talks to it over a command channel.  The task:
//!
//! - performs the WebSocket upgrade and the `CONNECT`/`CONNECTED` handshake
//! - sends and checks heart-beats at the negotiated intervals
//! - routes `MESSAGE` frames to subscription sinks by the `subscription` header
//! - reconnects after transient loss and re-sends every live `SUBSCRIBE`
//! - stops for good when the broker rejects the handshake

use crate::{
    error::{ChatLinkError, Result},
    event_handlers::{ConnectionError, DisconnectReason, EventHandlers},
    models::ConnectionOptions,
    stomp::frame::{Command, Frame, HeartBeat},
    timeouts::LinkTimeouts,
    transport::{
        ConnectHeaders, FrameSink, SubscriptionId, Transport, TransportEvent, TransportEvents,
    },
};
use futures_util::{future::BoxFuture, FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::{
    self, client::IntoClientRequest, protocol::Message,
};

type WebSocketStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Far enough ahead to act as "never" without overflowing `Instant + Duration`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// A peer is considered dead after this many missed heart-beat intervals.
const HEARTBEAT_GRACE_FACTOR: u32 = 2;

/// `now + period`, saturating at [`FAR_FUTURE`]. A broker may advertise any
/// `u64` heart-beat, which would overflow a plain `Instant + Duration`.
fn deadline_after(period: Duration) -> TokioInstant {
    TokioInstant::now() + period.min(FAR_FUTURE)
}

// ── Commands ────────────────────────────────────────────────────────────────

enum ConnCmd {
    Subscribe {
        id: String,
        destination: String,
        sink: FrameSink,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Unsubscribe {
        id: String,
    },
    Publish {
        destination: String,
        body: String,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Shutdown {
        done_tx: Option<oneshot::Sender<()>>,
    },
}

struct SubEntry {
    destination: String,
    sink: FrameSink,
}

// ── StompTransport (public handle) ──────────────────────────────────────────

struct Session {
    cmd_tx: mpsc::Sender<ConnCmd>,
    connected: Arc<AtomicBool>,
    _task: JoinHandle<()>,
}

/// Broker client speaking STOMP 1.2 over a WebSocket.
///
/// ```rust,no_run
/// use chat_link::{stomp::StompTransport, ConnectionOptions, EventHandlers, LinkTimeouts};
///
/// let transport = StompTransport::new(
///     "ws://localhost:8080/ws",
///     ConnectionOptions::default(),
///     LinkTimeouts::default(),
///     EventHandlers::new(),
/// );
/// ```
pub struct StompTransport {
    endpoint: String,
    options: ConnectionOptions,
    timeouts: LinkTimeouts,
    event_handlers: EventHandlers,
    session: Mutex<Option<Session>>,
    next_subscription: AtomicU64,
}

impl StompTransport {
    pub fn new(
        endpoint: impl Into<String>,
        options: ConnectionOptions,
        timeouts: LinkTimeouts,
        event_handlers: EventHandlers,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            options,
            timeouts,
            event_handlers,
            session: Mutex::new(None),
            next_subscription: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn live_session(&self) -> Option<(mpsc::Sender<ConnCmd>, bool)> {
        self.session
            .lock()
            .as_ref()
            .map(|s| (s.cmd_tx.clone(), s.connected.load(Ordering::SeqCst)))
    }

    fn connected_session(&self) -> Result<mpsc::Sender<ConnCmd>> {
        match self.live_session() {
            Some((cmd_tx, true)) => Ok(cmd_tx),
            _ => Err(ChatLinkError::NotConnected),
        }
    }
}

impl Drop for StompTransport {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            let _ = session.cmd_tx.try_send(ConnCmd::Shutdown { done_tx: None });
        }
    }
}

#[async_trait::async_trait]
impl Transport for StompTransport {
    fn activate(&self, headers: ConnectHeaders) -> Result<TransportEvents> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            ChatLinkError::ConfigurationError(
                "StompTransport::activate must be called inside a Tokio runtime".to_string(),
            )
        })?;

        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let ctx = TaskContext {
            endpoint: self.endpoint.clone(),
            options: self.options.clone(),
            timeouts: self.timeouts.clone(),
            headers,
            event_handlers: self.event_handlers.clone(),
            events: events_tx,
            connected: connected.clone(),
        };
        let task = runtime.spawn(connection_task(ctx, cmd_rx));

        let previous = self.session.lock().replace(Session {
            cmd_tx,
            connected,
            _task: task,
        });
        if let Some(old) = previous {
            log::debug!("[chat-link] Replacing active STOMP session");
            old.connected.store(false, Ordering::SeqCst);
            let _ = old.cmd_tx.try_send(ConnCmd::Shutdown { done_tx: None });
        }

        Ok(events_rx)
    }

    fn deactivate(&self) -> BoxFuture<'static, Result<()>> {
        let Some(session) = self.session.lock().take() else {
            return async { Ok(()) }.boxed();
        };
        session.connected.store(false, Ordering::SeqCst);

        async move {
            let (done_tx, done_rx) = oneshot::channel();
            if session
                .cmd_tx
                .send(ConnCmd::Shutdown {
                    done_tx: Some(done_tx),
                })
                .await
                .is_err()
            {
                // Task already finished on its own (e.g. rejected handshake).
                return Ok(());
            }
            done_rx.await.map_err(|_| {
                ChatLinkError::InternalError(
                    "STOMP connection task exited during shutdown".to_string(),
                )
            })
        }
        .boxed()
    }

    fn is_connected(&self) -> bool {
        matches!(self.live_session(), Some((_, true)))
    }

    async fn subscribe(&self, destination: &str, sink: FrameSink) -> Result<SubscriptionId> {
        let cmd_tx = self.connected_session()?;
        let id = format!(
            "sub-{}",
            self.next_subscription.fetch_add(1, Ordering::Relaxed)
        );
        let (result_tx, result_rx) = oneshot::channel();

        cmd_tx
            .send(ConnCmd::Subscribe {
                id: id.clone(),
                destination: destination.to_string(),
                sink,
                result_tx,
            })
            .await
            .map_err(|_| ChatLinkError::NotConnected)?;

        result_rx.await.map_err(|_| {
            ChatLinkError::WebSocketError(
                "Connection task died before confirming subscribe".to_string(),
            )
        })??;

        Ok(SubscriptionId(id))
    }

    async fn unsubscribe(&self, id: &SubscriptionId) -> Result<()> {
        let Some((cmd_tx, _)) = self.live_session() else {
            return Ok(());
        };
        // A closed channel means the session is gone and the subscription with it.
        let _ = cmd_tx
            .send(ConnCmd::Unsubscribe {
                id: id.0.clone(),
            })
            .await;
        Ok(())
    }

    async fn publish(&self, destination: &str, body: String) -> Result<()> {
        let cmd_tx = self.connected_session()?;
        let (result_tx, result_rx) = oneshot::channel();

        cmd_tx
            .send(ConnCmd::Publish {
                destination: destination.to_string(),
                body,
                result_tx,
            })
            .await
            .map_err(|_| ChatLinkError::NotConnected)?;

        result_rx.await.map_err(|_| {
            ChatLinkError::WebSocketError(
                "Connection task died before confirming publish".to_string(),
            )
        })?
    }
}

// ── Background connection task ──────────────────────────────────────────────

struct TaskContext {
    endpoint: String,
    options: ConnectionOptions,
    timeouts: LinkTimeouts,
    headers: ConnectHeaders,
    event_handlers: EventHandlers,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

impl TaskContext {
    fn emit(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

enum HandshakeFailure {
    /// The broker said no.  Retrying with the same credentials is pointless.
    Rejected(String),
    /// Network-level problem; worth another attempt.
    Retryable(ChatLinkError),
}

struct Established {
    ws: WebSocketStream,
    send_every: Duration,
    expect_every: Duration,
}

enum LoopExit {
    Shutdown(Option<oneshot::Sender<()>>),
    Lost(DisconnectReason),
}

async fn with_timeout<F, T>(limit: Duration, what: &str, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    if LinkTimeouts::is_no_timeout(limit) {
        return fut.await;
    }
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChatLinkError::TimeoutError(format!("{} timed out after {:?}", what, limit)))?
}

async fn send_frame(ws: &mut WebSocketStream, frame: &Frame, ctx: &TaskContext) -> Result<()> {
    let encoded = frame.encode();
    if ctx.event_handlers.on_send.is_some() {
        ctx.event_handlers.emit_send(&frame.redacted().encode());
    }
    log::trace!("[chat-link] >>> {}", frame);
    with_timeout(ctx.timeouts.send_timeout, "Sending frame", async {
        ws.send(Message::Text(encoded.into()))
            .await
            .map_err(ChatLinkError::from)
    })
    .await
}

async fn establish(ctx: &TaskContext) -> std::result::Result<Established, HandshakeFailure> {
    log::debug!("[chat-link] Connecting to {}", ctx.endpoint);

    let request = ctx.endpoint.as_str().into_client_request().map_err(|e| {
        HandshakeFailure::Rejected(format!("Invalid broker endpoint '{}': {}", ctx.endpoint, e))
    })?;
    let host = ctx
        .options
        .virtual_host
        .clone()
        .or_else(|| request.uri().host().map(str::to_string))
        .unwrap_or_else(|| "localhost".to_string());

    let upgrade = with_timeout(ctx.timeouts.connection_timeout, "WebSocket connect", async {
        match tokio_tungstenite::connect_async(request).await {
            Ok((stream, _response)) => Ok(Ok(stream)),
            Err(tungstenite::Error::Http(response)) => {
                let status = response.status().as_u16();
                Ok(Err(status))
            },
            Err(e) => Err(ChatLinkError::WebSocketError(format!("Connection failed: {}", e))),
        }
    })
    .await
    .map_err(HandshakeFailure::Retryable)?;

    let mut ws = match upgrade {
        Ok(stream) => stream,
        Err(401) => {
            return Err(HandshakeFailure::Rejected(
                "Unauthorized: broker requires valid credentials".to_string(),
            ))
        },
        Err(403) => {
            return Err(HandshakeFailure::Rejected(
                "Forbidden: access to broker denied".to_string(),
            ))
        },
        Err(code) => {
            return Err(HandshakeFailure::Retryable(ChatLinkError::WebSocketError(
                format!("WebSocket HTTP error: {}", code),
            )))
        },
    };

    let offered = ctx.options.heartbeat();
    let connect = Frame::connect(&host, offered, ctx.headers.clone().into_pairs());
    send_frame(&mut ws, &connect, ctx)
        .await
        .map_err(HandshakeFailure::Retryable)?;

    let server_beat = with_timeout(
        ctx.timeouts.handshake_timeout,
        "STOMP handshake",
        await_connected(&mut ws, ctx),
    )
    .await
    .map_err(|e| match e {
        ChatLinkError::AuthenticationError(reason) => HandshakeFailure::Rejected(reason),
        other => HandshakeFailure::Retryable(other),
    })?;

    let (send_ms, expect_ms) = HeartBeat::negotiate(offered, server_beat);
    log::info!(
        "[chat-link] STOMP session established (heart-beat out={}ms in={}ms)",
        send_ms,
        expect_ms
    );

    Ok(Established {
        ws,
        send_every: Duration::from_millis(send_ms),
        expect_every: Duration::from_millis(expect_ms),
    })
}

/// Read until `CONNECTED`; an `ERROR` frame becomes `AuthenticationError`.
async fn await_connected(ws: &mut WebSocketStream, ctx: &TaskContext) -> Result<HeartBeat> {
    loop {
        let text = match ws.next().await {
            Some(Ok(Message::Text(text))) => text.as_str().to_string(),
            Some(Ok(Message::Binary(data))) => String::from_utf8(data.to_vec()).map_err(|_| {
                ChatLinkError::ProtocolError("Non UTF-8 frame during handshake".to_string())
            })?,
            Some(Ok(Message::Close(_))) | None => {
                return Err(ChatLinkError::WebSocketError(
                    "Broker closed the socket during handshake".to_string(),
                ))
            },
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
        };

        ctx.event_handlers.emit_receive(&text);
        for frame in Frame::parse_all(&text)? {
            match frame.command {
                Command::Connected => {
                    return match frame.header("heart-beat") {
                        Some(value) => HeartBeat::parse(value),
                        None => Ok(HeartBeat::default()),
                    };
                },
                Command::Error => {
                    let message = frame.header("message").unwrap_or("Handshake rejected");
                    let reason = if frame.body.is_empty() {
                        message.to_string()
                    } else {
                        format!("{}: {}", message, frame.body.trim())
                    };
                    return Err(ChatLinkError::AuthenticationError(reason));
                },
                other => log::debug!("[chat-link] Ignoring {} before CONNECTED", other),
            }
        }
    }
}

async fn resubscribe_all(ws: &mut WebSocketStream, subs: &HashMap<String, SubEntry>, ctx: &TaskContext) {
    if subs.is_empty() {
        return;
    }
    log::info!(
        "[chat-link] Re-subscribing {} active subscription(s) after reconnect",
        subs.len()
    );
    for (id, entry) in subs {
        if let Err(e) = send_frame(ws, &Frame::subscribe(id, &entry.destination), ctx).await {
            log::warn!("[chat-link] Failed to re-subscribe {} ({}): {}", id, entry.destination, e);
            ctx.emit(TransportEvent::Error(ConnectionError::new(
                format!("Failed to re-subscribe {}: {}", entry.destination, e),
                true,
            )));
        }
    }
}

fn route_message(frame: &Frame, subs: &HashMap<String, SubEntry>) {
    let Some(sub_id) = frame.header("subscription") else {
        log::debug!("[chat-link] MESSAGE without subscription header dropped");
        return;
    };
    match subs.get(sub_id) {
        Some(entry) => (entry.sink)(&frame.body),
        None => log::debug!("[chat-link] No subscription found for id: {}", sub_id),
    }
}

/// Handle a command while no socket is open.  Returns the shutdown request, if any.
fn handle_offline_cmd(
    cmd: Option<ConnCmd>,
    subs: &mut HashMap<String, SubEntry>,
) -> Option<Option<oneshot::Sender<()>>> {
    match cmd {
        Some(ConnCmd::Subscribe { result_tx, .. }) => {
            let _ = result_tx.send(Err(ChatLinkError::NotConnected));
            None
        },
        Some(ConnCmd::Publish { result_tx, .. }) => {
            let _ = result_tx.send(Err(ChatLinkError::NotConnected));
            None
        },
        Some(ConnCmd::Unsubscribe { id }) => {
            subs.remove(&id);
            None
        },
        Some(ConnCmd::Shutdown { done_tx }) => Some(done_tx),
        None => Some(None),
    }
}

/// Serve commands until shutdown.
async fn next_shutdown(
    cmd_rx: &mut mpsc::Receiver<ConnCmd>,
    subs: &mut HashMap<String, SubEntry>,
) -> Option<oneshot::Sender<()>> {
    loop {
        if let Some(done_tx) = handle_offline_cmd(cmd_rx.recv().await, subs) {
            return done_tx;
        }
    }
}

/// Sleep for `delay` while serving commands.  `Some` if shutdown was requested.
async fn sleep_or_shutdown(
    delay: Duration,
    cmd_rx: &mut mpsc::Receiver<ConnCmd>,
    subs: &mut HashMap<String, SubEntry>,
) -> Option<Option<oneshot::Sender<()>>> {
    tokio::select! {
        biased;
        done_tx = next_shutdown(cmd_rx, subs) => Some(done_tx),
        _ = tokio::time::sleep(delay) => None,
    }
}

fn finish(done_tx: Option<oneshot::Sender<()>>) {
    if let Some(tx) = done_tx {
        let _ = tx.send(());
    }
}

async fn connection_task(ctx: TaskContext, mut cmd_rx: mpsc::Receiver<ConnCmd>) {
    let mut subs: HashMap<String, SubEntry> = HashMap::new();
    let mut attempt: u32 = 0;
    let mut ever_connected = false;

    loop {
        // ── Connect or reconnect ────────────────────────────────────────────
        let outcome = tokio::select! {
            biased;
            done_tx = next_shutdown(&mut cmd_rx, &mut subs) => {
                log::debug!("[chat-link] Shutdown requested while connecting");
                finish(done_tx);
                return;
            }
            outcome = establish(&ctx) => outcome,
        };

        let established = match outcome {
            Ok(established) => established,
            Err(HandshakeFailure::Rejected(reason)) => {
                log::warn!("[chat-link] Broker rejected connection: {}", reason);
                if ever_connected {
                    ctx.emit(TransportEvent::Error(ConnectionError::new(&reason, false)));
                } else {
                    ctx.emit(TransportEvent::ConnectFailed(reason));
                }
                finish(next_shutdown(&mut cmd_rx, &mut subs).await);
                return;
            },
            Err(HandshakeFailure::Retryable(err)) => {
                log::warn!("[chat-link] Connection attempt {} failed: {}", attempt + 1, err);
                if !ctx.options.allows_reconnect_attempt(attempt) {
                    let reason = format!("Giving up after {} attempt(s): {}", attempt + 1, err);
                    if ever_connected {
                        ctx.emit(TransportEvent::Error(ConnectionError::new(&reason, false)));
                    } else {
                        ctx.emit(TransportEvent::ConnectFailed(reason));
                    }
                    finish(next_shutdown(&mut cmd_rx, &mut subs).await);
                    return;
                }
                ctx.emit(TransportEvent::Error(ConnectionError::new(err.to_string(), true)));
                let delay = Duration::from_millis(ctx.options.reconnect_delay_for(attempt));
                attempt += 1;
                log::info!(
                    "[chat-link] Attempting reconnection in {:?} (attempt {})",
                    delay,
                    attempt + 1
                );
                if let Some(done_tx) = sleep_or_shutdown(delay, &mut cmd_rx, &mut subs).await {
                    finish(done_tx);
                    return;
                }
                continue;
            },
        };

        attempt = 0;
        let Established {
            mut ws,
            send_every,
            expect_every,
        } = established;

        if ever_connected {
            resubscribe_all(&mut ws, &subs, &ctx).await;
            ctx.connected.store(true, Ordering::SeqCst);
            ctx.emit(TransportEvent::Reconnected);
        } else {
            ever_connected = true;
            ctx.connected.store(true, Ordering::SeqCst);
            ctx.emit(TransportEvent::Connected);
        }

        // ── Connected ───────────────────────────────────────────────────────
        let exit = run_connected(&ctx, &mut ws, &mut cmd_rx, &mut subs, send_every, expect_every).await;
        ctx.connected.store(false, Ordering::SeqCst);

        match exit {
            LoopExit::Shutdown(done_tx) => {
                close_gracefully(&ctx, &mut ws, &subs).await;
                finish(done_tx);
                return;
            },
            LoopExit::Lost(reason) => {
                log::warn!("[chat-link] Connection lost: {}", reason);
                ctx.emit(TransportEvent::Disconnected(reason));
                if !ctx.options.allows_reconnect_attempt(attempt) {
                    ctx.emit(TransportEvent::Error(ConnectionError::new(
                        "Connection lost and reconnection is disabled",
                        false,
                    )));
                    finish(next_shutdown(&mut cmd_rx, &mut subs).await);
                    return;
                }
                let delay = Duration::from_millis(ctx.options.reconnect_delay_for(attempt));
                attempt += 1;
                if let Some(done_tx) = sleep_or_shutdown(delay, &mut cmd_rx, &mut subs).await {
                    finish(done_tx);
                    return;
                }
            },
        }
    }
}

async fn run_connected(
    ctx: &TaskContext,
    ws: &mut WebSocketStream,
    cmd_rx: &mut mpsc::Receiver<ConnCmd>,
    subs: &mut HashMap<String, SubEntry>,
    send_every: Duration,
    expect_every: Duration,
) -> LoopExit {
    let sends_beats = !send_every.is_zero();
    let expects_beats = !expect_every.is_zero();
    let silence_limit = expect_every
        .checked_mul(HEARTBEAT_GRACE_FACTOR)
        .unwrap_or(FAR_FUTURE);

    let mut next_beat = deadline_after(if sends_beats { send_every } else { FAR_FUTURE });
    let mut inbound_deadline =
        deadline_after(if expects_beats { silence_limit } else { FAR_FUTURE });

    loop {
        let beat_sleep = tokio::time::sleep_until(next_beat);
        tokio::pin!(beat_sleep);
        let silence_sleep = tokio::time::sleep_until(inbound_deadline);
        tokio::pin!(silence_sleep);

        tokio::select! {
            biased;

            _ = &mut silence_sleep, if expects_beats => {
                return LoopExit::Lost(DisconnectReason::new(format!(
                    "No data from broker within {:?}",
                    silence_limit
                )));
            }

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnCmd::Subscribe { id, destination, sink, result_tx }) => {
                        let result = send_frame(ws, &Frame::subscribe(&id, &destination), ctx).await;
                        let failed = result.is_err();
                        if result.is_ok() {
                            log::debug!("[chat-link] Subscribed {} to {}", id, destination);
                            subs.insert(id, SubEntry { destination, sink });
                        }
                        let _ = result_tx.send(result);
                        if failed {
                            return LoopExit::Lost(DisconnectReason::new("Failed to send SUBSCRIBE"));
                        }
                    },
                    Some(ConnCmd::Unsubscribe { id }) => {
                        if subs.remove(&id).is_some() {
                            if let Err(e) = send_frame(ws, &Frame::unsubscribe(&id), ctx).await {
                                return LoopExit::Lost(DisconnectReason::new(format!(
                                    "Failed to send UNSUBSCRIBE: {}", e
                                )));
                            }
                        }
                    },
                    Some(ConnCmd::Publish { destination, body, result_tx }) => {
                        let result = send_frame(ws, &Frame::send_json(&destination, body), ctx).await;
                        let failed = result.is_err();
                        let _ = result_tx.send(result);
                        if failed {
                            return LoopExit::Lost(DisconnectReason::new("Failed to send SEND frame"));
                        }
                    },
                    Some(ConnCmd::Shutdown { done_tx }) => return LoopExit::Shutdown(done_tx),
                    None => return LoopExit::Shutdown(None),
                }
                if sends_beats {
                    next_beat = deadline_after(send_every);
                }
            }

            _ = &mut beat_sleep, if sends_beats => {
                if let Err(e) = ws.send(Message::Text(String::from("\n").into())).await {
                    return LoopExit::Lost(DisconnectReason::new(format!(
                        "Heart-beat send failed: {}", e
                    )));
                }
                next_beat = deadline_after(send_every);
            }

            message = ws.next() => {
                if expects_beats {
                    inbound_deadline = deadline_after(silence_limit);
                }
                let text = match message {
                    Some(Ok(Message::Text(text))) => text.as_str().to_string(),
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(_) => {
                            log::warn!("[chat-link] Dropping non UTF-8 binary frame");
                            continue;
                        },
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let reason = match frame {
                            Some(f) => DisconnectReason::with_code(f.reason.as_str(), u16::from(f.code)),
                            None => DisconnectReason::new("Broker closed connection"),
                        };
                        return LoopExit::Lost(reason);
                    },
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        return LoopExit::Lost(DisconnectReason::new(format!("WebSocket error: {}", e)));
                    },
                    None => return LoopExit::Lost(DisconnectReason::new("WebSocket stream ended")),
                };

                let frames = match Frame::parse_all(&text) {
                    Ok(frames) => frames,
                    Err(e) => {
                        log::warn!("[chat-link] Failed to parse STOMP frame: {}", e);
                        continue;
                    },
                };
                if !frames.is_empty() {
                    ctx.event_handlers.emit_receive(&text);
                }
                for frame in frames {
                    match frame.command {
                        Command::Message => route_message(&frame, subs),
                        Command::Receipt => {
                            log::debug!("[chat-link] Receipt {:?}", frame.header("receipt-id"));
                        },
                        Command::Error => {
                            let message = frame.header("message").unwrap_or("Broker error").to_string();
                            ctx.emit(TransportEvent::Error(ConnectionError::new(&message, true)));
                            return LoopExit::Lost(DisconnectReason::new(format!(
                                "Broker sent ERROR: {}", message
                            )));
                        },
                        other => log::debug!("[chat-link] Ignoring unexpected {} frame", other),
                    }
                }
            }
        }
    }
}

async fn close_gracefully(ctx: &TaskContext, ws: &mut WebSocketStream, subs: &HashMap<String, SubEntry>) {
    for id in subs.keys() {
        let _ = send_frame(ws, &Frame::unsubscribe(id), ctx).await;
    }

    let receipt = "disconnect-0";
    if send_frame(ws, &Frame::disconnect(receipt), ctx).await.is_ok() {
        let wait_receipt = async {
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let acknowledged = Frame::parse_all(text.as_str())
                        .unwrap_or_default()
                        .iter()
                        .any(|f| f.command == Command::Receipt && f.header("receipt-id") == Some(receipt));
                    if acknowledged {
                        return Ok(());
                    }
                }
            }
            Ok(())
        };
        if let Err(e) = with_timeout(ctx.timeouts.disconnect_timeout, "DISCONNECT receipt", wait_receipt).await {
            log::debug!("[chat-link] {}", e);
        }
    }

    let _ = ws.close(None).await;
    log::info!("[chat-link] STOMP session closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_after_saturates_huge_periods() {
        let before = TokioInstant::now();
        let huge = Duration::from_millis(u64::MAX);

        let deadline = deadline_after(huge);
        assert!(deadline >= before + FAR_FUTURE);
        assert!(deadline <= TokioInstant::now() + FAR_FUTURE);

        let silence = huge.checked_mul(HEARTBEAT_GRACE_FACTOR).unwrap_or(FAR_FUTURE);
        assert_eq!(silence, FAR_FUTURE);
    }

    #[test]
    fn test_deadline_after_keeps_short_periods() {
        let before = TokioInstant::now();
        let deadline = deadline_after(Duration::from_millis(250));
        assert!(deadline >= before + Duration::from_millis(250));
        assert!(deadline < before + Duration::from_secs(60));
    }
}
