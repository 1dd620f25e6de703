//! Merge command-line flags over the config file.

use chat_link::{topics, ConnectionOptions, LinkTimeouts};
use serde_json::Value;

use crate::config::{CLIConfiguration, DEFAULT_SERVER_URL};
use crate::error::{CLIError, Result};

/// Flags that can override or extend the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub url: Option<String>,
    pub token: Option<String>,
    pub subscribe: Vec<String>,
    pub chats: Vec<i64>,
    pub send: Option<String>,
    pub body: Option<String>,
    pub fast_timeouts: bool,
}

/// A one-off publish requested with `--send`.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub destination: String,
    pub payload: Value,
}

/// Everything needed to run one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub url: String,
    pub token: String,
    pub options: ConnectionOptions,
    pub timeouts: LinkTimeouts,
    pub topics: Vec<String>,
    pub outbound: Option<Outbound>,
}

impl SessionSettings {
    pub fn resolve(overrides: Overrides, config: &CLIConfiguration) -> Result<Self> {
        let url = overrides
            .url
            .or_else(|| config.server_url().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());

        let token = overrides
            .token
            .or_else(|| config.token().map(str::to_string))
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                CLIError::ConfigurationError(
                    "No token given. Pass --token or set [auth] token in the config file".into(),
                )
            })?;

        let mut topic_list = overrides.subscribe;
        for chat_id in overrides.chats {
            topic_list.extend(topics::chat_topics(chat_id));
        }

        let outbound = match (overrides.send, overrides.body) {
            (Some(destination), body) => {
                let payload = match body {
                    Some(raw) => serde_json::from_str(&raw)?,
                    None => Value::Object(Default::default()),
                };
                Some(Outbound {
                    destination,
                    payload,
                })
            },
            (None, Some(_)) => {
                return Err(CLIError::ConfigurationError(
                    "--body requires --send <destination>".into(),
                ))
            },
            (None, None) => None,
        };

        if topic_list.is_empty() && outbound.is_none() {
            return Err(CLIError::ConfigurationError(
                "Nothing to do: pass --subscribe, --chat or --send".into(),
            ));
        }

        let timeouts = if overrides.fast_timeouts {
            LinkTimeouts::fast()
        } else {
            LinkTimeouts::default()
        };

        Ok(Self {
            url,
            token,
            options: config.to_connection_options(),
            timeouts,
            topics: topic_list,
            outbound,
        })
    }
}
