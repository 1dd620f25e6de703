//! Chat CLI - follow live chat topics from the terminal
//!
//! # Usage
//!
//! ```bash
//! # Follow a chat (messages, typing, read receipts)
//! chat -u ws://localhost:8080/ws --token <JWT> --chat 42
//!
//! # Follow presence and send one message to chat 42
//! chat --subscribe /topic/presence \
//!      --send /app/chat.sendMessage/42 --body '{"content":"hi","type":"TEXT"}'
//! ```

use clap::Parser;

use chat_cli::{CLIConfiguration, CLIError, Overrides, Result, SessionSettings};
use chat_link::{ChatLinkError, ConnectionManager, EventHandlers, Subscription};

mod args;

use args::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = CLIConfiguration::load(&cli.config)?;
    let settings = SessionSettings::resolve(
        Overrides {
            url: cli.url,
            token: cli.token,
            subscribe: cli.subscribe,
            chats: cli.chat,
            send: cli.send,
            body: cli.body,
            fast_timeouts: cli.fast_timeouts,
        },
        &config,
    )?;

    let handlers = EventHandlers::new()
        .on_connect(|| eprintln!("* connected"))
        .on_reconnect(|| eprintln!("* reconnected"))
        .on_disconnect(|reason| eprintln!("* disconnected: {}", reason))
        .on_error(|error| {
            if error.recoverable {
                log::warn!("{}", error);
            } else {
                eprintln!("* connection failed: {}", error);
            }
        });

    let manager = ConnectionManager::builder()
        .endpoint(&settings.url)
        .options(settings.options.clone())
        .timeouts(settings.timeouts.clone())
        .event_handlers(handlers)
        .build()?;

    manager.connect(settings.token.as_str())?;

    let mut subscriptions: Vec<Subscription> = Vec::new();
    for topic in &settings.topics {
        let label = topic.clone();
        match manager
            .subscribe(topic, move |payload| println!("[{}] {}", label, payload))
            .await
        {
            Some(subscription) => {
                log::info!("Following {}", topic);
                subscriptions.push(subscription);
            },
            None => log::warn!("Could not subscribe to {}", topic),
        }
    }

    if !settings.topics.is_empty() && subscriptions.is_empty() {
        manager.disconnect().await;
        return Err(CLIError::SubscriptionError(
            "none of the requested topics could be subscribed".into(),
        ));
    }

    if let Some(outbound) = &settings.outbound {
        manager.publish(&outbound.destination, &outbound.payload).await;
        if !manager.is_connected() {
            manager.disconnect().await;
            return Err(CLIError::LinkError(ChatLinkError::NotConnected));
        }
        log::info!("Sent to {}", outbound.destination);
    }

    if !subscriptions.is_empty() {
        eprintln!("* following {} topic(s), press Ctrl-C to quit", subscriptions.len());
        tokio::signal::ctrl_c().await?;
    }

    for subscription in &subscriptions {
        subscription.unsubscribe().await;
    }
    manager.disconnect().await;
    Ok(())
}
