use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whisper_bridge::{
    mirror_outbound, start_server, BridgeConfig, ChatMessage, CommandDispatcher,
    CommandInvocation, CommandReply, DispatchQueue, JobRunner, RelayBridge, RelayClient,
    DEFAULT_LOG_FILTER,
};
use whisper_core::{Council, TextDisplay, WhisperBus};

/// Shows blessings in the log
struct LogDisplay;

impl TextDisplay for LogDisplay {
    fn set_text(&self, text: &str) {
        tracing::info!(target: "display", "{}", text);
    }
}

/// The council report itself lives elsewhere; here we only note the request
struct LoggedJobRunner;

#[async_trait]
impl JobRunner for LoggedJobRunner {
    async fn run(&self, job: String) -> whisper_bridge::Result<()> {
        tracing::info!(target: "dispatcher", job = %job, "External job requested");
        Ok(())
    }
}

/// Console lines act as a chat message on `channel`: `!<to> <body>` whispers
/// and `/council ...` commands.
async fn console_loop(bridge: Arc<RelayBridge>, dispatcher: CommandDispatcher, channel: String) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(target: "relay", error = %e, "Console read failed");
                break;
            }
        };
        if line.trim_start().starts_with('/') {
            let reply = match CommandInvocation::parse_slash(&line, "console") {
                Some(inv) => dispatcher.dispatch(inv).await,
                None => CommandReply::Unknown,
            };
            tracing::info!(target: "dispatcher", reply = ?reply, "Command handled");
            continue;
        }
        let msg = ChatMessage {
            author: "console".into(),
            channel_id: channel.clone(),
            is_bot: false,
            content: line,
        };
        bridge.handle_chat_message(&msg).await;
    }
    tracing::debug!(target: "relay", "Console closed");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().compact().with_target(true))
        .init();

    let config = BridgeConfig::load();
    config.validate()?;
    let addr = config.socket_addr()?;

    let bus = Arc::new(WhisperBus::new());
    let council = Council::assemble(bus.clone(), Arc::new(LogDisplay))?;
    let (queue, dispatcher_handle) = DispatchQueue::spawn(bus.clone(), config.queue_capacity);

    if config.relay.mirror {
        match RelayClient::new(&config.relay) {
            Ok(client) => {
                mirror_outbound(&bus, client);
            }
            Err(e) => tracing::warn!(target: "relay", error = %e, "Outbound mirror disabled"),
        }
    }

    // Relay commands go to the remote bus when one is configured, else to ours
    let bridge = Arc::new(RelayBridge::from_config(&config, Some(queue.clone()))?);
    let dispatcher = CommandDispatcher::new(Arc::new(LoggedJobRunner), bridge.clone());
    tokio::spawn(console_loop(bridge, dispatcher, config.gate.channel_id.clone()));

    // Blocks until ctrl-c
    let server_result = start_server(addr, queue, bus.clone()).await;

    council.dismiss();
    dispatcher_handle.abort();
    tracing::info!(target: "ingest", stats = ?bus.stats(), "Whisper bridge stopped");

    server_result.map_err(|e| e.into())
}
