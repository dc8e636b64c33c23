//! Console conversation bridged to an agent server.
//!
//! Run with: cargo run -p console-bridge
//!
//! Each line read from stdin is one user turn. Set `AGENT_BRIDGE_URL` to point
//! at the agent server (default `http://localhost:3001`) and `RUST_LOG` to
//! adjust logging.

use std::{sync::Arc, time::Duration};

use agent_bridge_core::{ConversationRef, ConversationSink, DeliveryError, Hint, Notification};
use agent_bridge_session::{
    AgentSessionFactory, BridgeConfig, MemorySessionStore, SessionRegistry,
};
use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

const ERROR_REPLY: &str = "The assistant encountered an error.";

/// Prints notifications to stdout.
struct ConsoleSink;

#[async_trait]
impl ConversationSink for ConsoleSink {
    async fn deliver(
        &self,
        _conversation: &ConversationRef,
        notification: Notification,
    ) -> Result<(), DeliveryError> {
        let glyph = match notification.hint {
            Hint::Success => "[done]",
            Hint::Question => "[?]",
            Hint::Idea => "[~]",
            Hint::File => "[file]",
            Hint::Note => "[.]",
        };
        if notification.important {
            println!("{glyph} ** {} **", notification.text);
        } else {
            println!("{glyph} {}", notification.text);
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BridgeConfig::from_env().context("invalid configuration")?;
    let factory = AgentSessionFactory::new(&config, Arc::new(ConsoleSink))
        .context("invalid agent server url")?;
    let registry = Arc::new(
        SessionRegistry::new(MemorySessionStore::new(), factory).with_ttl(config.session_ttl()),
    );
    let sweeper = config
        .session_ttl()
        .map(|ttl| registry.spawn_sweeper(ttl.min(Duration::from_secs(60))));

    let user_id = std::env::var("AGENT_BRIDGE_USER").unwrap_or_else(|_| "console".to_string());
    let conversation = ConversationRef::new(Uuid::new_v4().to_string(), user_id);
    tracing::info!(
        server_url = %config.server_url,
        conversation_id = %conversation.conversation_id,
        "Console bridge ready"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        match registry.handle_turn(&conversation, &line).await {
            Ok(replies) => {
                for reply in replies {
                    println!("> {reply}");
                }
            }
            Err(e) => {
                tracing::error!(conversation_id = %conversation.conversation_id, "Turn failed: {e}");
                println!("> {ERROR_REPLY}");
            }
        }
    }

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    registry.shutdown().await;
    Ok(())
}
