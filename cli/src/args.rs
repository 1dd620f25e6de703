use clap::Parser;
use std::path::PathBuf;

/// Chat CLI - follow live chat topics from the terminal
#[derive(Parser, Debug)]
#[command(name = "chat")]
#[command(author = "Chat Team")]
#[command(version)]
#[command(about = "Subscribe to and publish on a chat server's live channel", long_about = None)]
pub struct Cli {
    /// Broker WebSocket URL (e.g., ws://localhost:8080/ws)
    #[arg(short = 'u', long = "url", env = "CHAT_URL")]
    pub url: Option<String>,

    /// JWT authentication token
    #[arg(long = "token", env = "CHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(long = "config", default_value = "~/.chat/config.toml")]
    pub config: PathBuf,

    /// Topic to follow (repeatable)
    #[arg(short = 's', long = "subscribe")]
    pub subscribe: Vec<String>,

    /// Follow the message, typing and read-receipt topics of a chat (repeatable)
    #[arg(long = "chat")]
    pub chat: Vec<i64>,

    /// Publish once to this destination after connecting
    #[arg(long = "send", requires = "body")]
    pub send: Option<String>,

    /// JSON payload for --send
    #[arg(long = "body")]
    pub body: Option<String>,

    /// Use short timeouts (handy against a local server)
    #[arg(long = "fast-timeouts")]
    pub fast_timeouts: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}
