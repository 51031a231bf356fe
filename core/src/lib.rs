// Whisper Core Library
// Addressed whisper bus for named agents

pub mod agent;
pub mod bus;
pub mod council;
pub mod display;
pub mod message;
pub mod reaction;
pub mod registry;

// Export core types
pub use agent::{Agent, Reaction};
pub use bus::{BusStats, DispatchReport, SubscriptionHandle, WhisperBus, WhisperHandler};
pub use council::Council;
pub use display::{TextDisplay, TextPanel};
pub use message::{AgentName, Origin, Recipient, WhisperMessage, BROADCAST};
pub use reaction::{Effect, ReactionTable, Rule, Trigger};
pub use registry::AddressRegistry;

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("Invalid agent name: {0}")]
    InvalidName(String),

    #[error("Handler error: {0}")]
    Handler(String),
}
pub type Result<T> = std::result::Result<T, WhisperError>;
