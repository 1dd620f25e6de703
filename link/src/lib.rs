//! # chat-link
//!
//! Client library for a chat server's real-time channel: one STOMP 1.2
//! connection over WebSocket, shared by any number of topic subscriptions
//! and outbound publishes.
//!
//! The entry point is [`ConnectionManager`].  Subscribe and publish calls may
//! be issued right after (or even before) [`ConnectionManager::connect`]; they
//! wait for the connect attempt to settle and then proceed or give up.
//!
//! ```rust,no_run
//! use chat_link::{models::ChatMessage, topics, ConnectionManager, EventHandlers};
//!
//! # async fn example() -> chat_link::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .endpoint("ws://localhost:8080/ws")
//!     .event_handlers(EventHandlers::new().on_connect(|| println!("online")))
//!     .build()?;
//!
//! manager.connect("my-jwt")?;
//!
//! let _messages = manager
//!     .subscribe_json(&topics::chat_messages(7), |msg: ChatMessage| {
//!         println!("{}: {}", msg.author.username, msg.content);
//!     })
//!     .await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod error;
pub mod event_handlers;
pub mod latch;
pub mod manager;
pub mod models;
pub mod stomp;
pub mod timeouts;
pub mod topics;
pub mod transport;

pub use auth::AuthToken;
pub use error::{ChatLinkError, Result};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use latch::{Readiness, ReadinessLatch, ReadinessSignal};
pub use manager::{ConnectionManager, ConnectionManagerBuilder, ConnectionPhase, Subscription};
pub use models::ConnectionOptions;
pub use timeouts::{LinkTimeouts, LinkTimeoutsBuilder};
pub use transport::{
    ConnectHeaders, FrameSink, SubscriptionId, Transport, TransportEvent, TransportEvents,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
