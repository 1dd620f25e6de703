//! STOMP 1.2 over WebSocket: frame codec and the production [`Transport`](crate::transport::Transport).

pub mod frame;
pub mod transport;

pub use frame::{Command, Frame, HeartBeat};
pub use transport::StompTransport;
