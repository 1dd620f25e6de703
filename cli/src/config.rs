//! Configuration file management
//!
//! # Configuration Format
//!
//! ```toml
//! [server]
//! url = "ws://localhost:8080/ws"  # Broker WebSocket endpoint
//!
//! [connection]
//! auto_reconnect = true           # Reconnect after connection loss
//! reconnect_delay_ms = 5000       # Initial reconnect delay
//! max_reconnect_delay_ms = 5000   # Maximum reconnect delay
//! max_reconnect_attempts = 0      # 0 = unlimited
//! heartbeat_outgoing_ms = 4000
//! heartbeat_incoming_ms = 4000
//!
//! [auth]
//! token = "your-jwt-token"
//! ```

use chat_link::ConnectionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CLIError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "~/.chat/config.toml";
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8080/ws";

/// CLI configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CLIConfiguration {
    pub server: Option<ServerConfig>,
    pub connection: Option<ConnectionConfig>,
    pub auth: Option<AuthConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Broker WebSocket URL (e.g., ws://localhost:8080/ws)
    pub url: Option<String>,
}

/// Reconnection and heart-beat settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts (0 = unlimited)
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_outgoing_ms: u64,

    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_incoming_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// JWT issued by the chat server's login endpoint
    pub token: Option<String>,
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

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or(DEFAULT_CONFIG_PATH);
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

pub fn default_config_path() -> PathBuf {
    expand_config_path(Path::new(DEFAULT_CONFIG_PATH))
}

impl CLIConfiguration {
    /// Load configuration from file
    ///
    /// Returns default configuration if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        let path = expand_config_path(path);

        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            CLIError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;

        let config: CLIConfiguration = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let path = expand_config_path(path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CLIError::ConfigurationError(format!("Failed to serialize: {}", e)))?;

        std::fs::write(&path, contents)?;
        Ok(())
    }

    pub fn server_url(&self) -> Option<&str> {
        self.server.as_ref().and_then(|s| s.url.as_deref())
    }

    pub fn token(&self) -> Option<&str> {
        self.auth.as_ref().and_then(|a| a.token.as_deref())
    }

    /// Build chat-link ConnectionOptions from the `[connection]` table
    pub fn to_connection_options(&self) -> ConnectionOptions {
        let mut options = ConnectionOptions::default();

        if let Some(ref conn) = self.connection {
            // 0 means unlimited
            let max_attempts = if conn.max_reconnect_attempts == 0 {
                None
            } else {
                Some(conn.max_reconnect_attempts)
            };
            options = options
                .with_auto_reconnect(conn.auto_reconnect)
                .with_reconnect_delay_ms(conn.reconnect_delay_ms)
                .with_max_reconnect_delay_ms(conn.max_reconnect_delay_ms)
                .with_max_reconnect_attempts(max_attempts)
                .with_heartbeat_ms(conn.heartbeat_outgoing_ms, conn.heartbeat_incoming_ms);
        }

        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = CLIConfiguration::load(&dir.path().join("absent.toml")).unwrap();
        assert!(config.server_url().is_none());
        assert!(config.token().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[server]
url = "wss://chat.example.com/ws"

[connection]
auto_reconnect = false
reconnect_delay_ms = 250
max_reconnect_attempts = 3

[auth]
token = "abc.def.ghi"
"#,
        )
        .unwrap();

        let config = CLIConfiguration::load(&path).unwrap();
        assert_eq!(config.server_url(), Some("wss://chat.example.com/ws"));
        assert_eq!(config.token(), Some("abc.def.ghi"));

        let options = config.to_connection_options();
        assert!(!options.auto_reconnect);
        assert_eq!(options.reconnect_delay_ms, 250);
        assert_eq!(options.max_reconnect_delay_ms, 5000);
        assert_eq!(options.max_reconnect_attempts, Some(3));
        assert_eq!(options.heartbeat_outgoing_ms, 4000);
    }

    #[test]
    fn test_zero_attempts_means_unlimited() {
        let config: CLIConfiguration = toml::from_str("[connection]\nmax_reconnect_attempts = 0\n").unwrap();
        assert_eq!(config.to_connection_options().max_reconnect_attempts, None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = CLIConfiguration {
            server: Some(ServerConfig {
                url: Some(DEFAULT_SERVER_URL.to_string()),
            }),
            connection: None,
            auth: None,
        };
        config.save(&path).unwrap();

        let reloaded = CLIConfiguration::load(&path).unwrap();
        assert_eq!(reloaded.server_url(), Some(DEFAULT_SERVER_URL));
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server\nurl = ").unwrap();
        assert!(matches!(
            CLIConfiguration::load(&path),
            Err(CLIError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_expand_home_path() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(
                expand_config_path(Path::new("~/.chat/config.toml")),
                home.join(".chat/config.toml")
            );
        }
        assert_eq!(
            expand_config_path(Path::new("/etc/chat.toml")),
            PathBuf::from("/etc/chat.toml")
        );
    }
}
