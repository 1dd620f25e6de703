//! Library entry point for chat-cli components.
//!
//! Exposes config loading and session settings so tests can exercise them
//! without going through the binary entry point.

pub mod config;
pub mod error;
pub mod settings;

pub use config::CLIConfiguration;
pub use error::{CLIError, Result};
pub use settings::{Outbound, Overrides, SessionSettings};
