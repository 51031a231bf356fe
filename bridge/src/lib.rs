pub mod client;
pub mod command;
pub mod config;
pub mod dispatcher;
pub mod gate;
pub mod queue;
pub mod relay;
pub mod server;

pub use client::RelayClient;
pub use command::{parse_external_command, ParseError, RelayCommand, WhisperPayload};
pub use config::{BridgeConfig, GateConfig, RelayConfig, DEFAULT_CHANNEL, DEFAULT_LOG_FILTER};
pub use dispatcher::{CommandAction, CommandDispatcher, CommandInvocation, CommandReply, JobRunner};
pub use gate::{ChannelGate, ChatMessage};
pub use queue::DispatchQueue;
pub use relay::{mirror_outbound, IngestOutcome, RelayBridge, RelayTarget};
pub use server::{router, start_server};

use whisper_core::WhisperError;

#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("delivery failed ({from} → {to}): {reason}")]
    Delivery {
        from: String,
        to: String,
        reason: String,
    },
    #[error("config error: {0}")]
    Config(String),
    #[error("dispatch queue closed")]
    QueueClosed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("core error: {0}")]
    Core(#[from] WhisperError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
