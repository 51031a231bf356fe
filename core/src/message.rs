// Whisper message and addressing types
use crate::{Result, WhisperError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved addressee meaning "every current subscriber"
pub const BROADCAST: &str = "*";

/// Name of a subscribing agent. Never empty and never the broadcast marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentName(String);

impl AgentName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(WhisperError::InvalidName("agent name is empty".into()));
        }
        if name == BROADCAST {
            return Err(WhisperError::InvalidName(format!(
                "'{}' is reserved for broadcast",
                BROADCAST
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AgentName {
    type Error = WhisperError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<AgentName> for String {
    fn from(name: AgentName) -> Self {
        name.0
    }
}

impl PartialEq<str> for AgentName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Addressee of a whisper, or the address a subscription listens on.
///
/// As a subscription address, `Broadcast` is a tap that observes every whisper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Recipient {
    Agent(AgentName),
    Broadcast,
}

impl Recipient {
    pub fn agent(name: impl Into<String>) -> Result<Self> {
        AgentName::new(name).map(Recipient::Agent)
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self, Recipient::Broadcast)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Recipient::Agent(name) => name.as_str(),
            Recipient::Broadcast => BROADCAST,
        }
    }
}

impl fmt::Display for Recipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recipient {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self> {
        if s == BROADCAST {
            Ok(Recipient::Broadcast)
        } else {
            Recipient::agent(s)
        }
    }
}

impl TryFrom<String> for Recipient {
    type Error = WhisperError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Recipient> for String {
    fn from(r: Recipient) -> Self {
        match r {
            Recipient::Agent(name) => name.into(),
            Recipient::Broadcast => BROADCAST.to_string(),
        }
    }
}

impl From<AgentName> for Recipient {
    fn from(name: AgentName) -> Self {
        Recipient::Agent(name)
    }
}

/// Where a whisper entered this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// Published by code running in this process
    #[default]
    Local,
    /// Handed in from outside (HTTP ingestion, chat relay)
    Relayed,
}

/// An addressed message. Immutable once constructed.
///
/// `from` is informational only and is not checked against the registry.
/// The origin never goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhisperMessage {
    from: String,
    to: Recipient,
    body: String,
    #[serde(skip)]
    origin: Origin,
}

impl WhisperMessage {
    pub fn new(from: impl Into<String>, to: Recipient, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to,
            body: body.into(),
            origin: Origin::Local,
        }
    }

    /// Same whisper, marked as arrived from outside
    pub fn relayed(mut self) -> Self {
        self.origin = Origin::Relayed;
        self
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn is_relayed(&self) -> bool {
        self.origin == Origin::Relayed
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &Recipient {
        &self.to
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether an agent listening under `name` should see this whisper
    pub fn is_addressed_to(&self, name: &AgentName) -> bool {
        match &self.to {
            Recipient::Broadcast => true,
            Recipient::Agent(to) => to == name,
        }
    }
}

impl fmt::Display for WhisperMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}: {}", self.from, self.to, self.body)
    }
}
