use serde::{Deserialize, Serialize};
use tracing::debug;

/// A text message from an external chat channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub channel_id: String,
    #[serde(default)]
    pub is_bot: bool,
    pub content: String,
}

/// Decides which chat messages count as relay commands: human authors in the
/// council channel whose text starts with the command marker.
#[derive(Debug, Clone)]
pub struct ChannelGate {
    channel_id: String,
    marker: char,
}

impl ChannelGate {
    pub fn new(channel_id: impl Into<String>, marker: char) -> Self {
        Self {
            channel_id: channel_id.into(),
            marker,
        }
    }

    pub fn marker(&self) -> char {
        self.marker
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub fn admits(&self, msg: &ChatMessage) -> bool {
        if msg.is_bot {
            debug!(target: "relay", author = %msg.author, "Ignoring bot message");
            return false;
        }
        // An unset channel matches nothing
        if self.channel_id.is_empty() || msg.channel_id != self.channel_id {
            debug!(target: "relay", channel = %msg.channel_id, "Ignoring message outside council channel");
            return false;
        }
        msg.content.starts_with(self.marker)
    }
}
