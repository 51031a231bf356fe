//! External relay commands: `!<to> <body>` text and `{from, to, message}` payloads.

use serde::{Deserialize, Serialize};
use whisper_core::{Recipient, WhisperMessage};

use crate::{BridgeError, Result};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("command does not start with '{0}'")]
    MissingMarker(char),
    #[error("command has no body")]
    EmptyBody,
}

/// A whisper requested from outside the process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCommand {
    pub from: String,
    pub to: Recipient,
    pub body: String,
}

impl RelayCommand {
    pub fn new(from: impl Into<String>, to: Recipient, body: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to,
            body: body.into(),
        }
    }

    /// The whisper to publish locally, marked as relayed so outbound
    /// mirroring never sends it back out
    pub fn into_whisper(self) -> WhisperMessage {
        WhisperMessage::new(self.from, self.to, self.body).relayed()
    }
}

impl From<&WhisperMessage> for RelayCommand {
    fn from(msg: &WhisperMessage) -> Self {
        Self::new(msg.from(), msg.to().clone(), msg.body())
    }
}

/// Wire format of `POST /osc`. Missing fields decode as empty strings and are
/// rejected by validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhisperPayload {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub message: String,
}

impl From<&RelayCommand> for WhisperPayload {
    fn from(cmd: &RelayCommand) -> Self {
        Self {
            from: cmd.from.clone(),
            to: cmd.to.to_string(),
            message: cmd.body.clone(),
        }
    }
}

impl TryFrom<WhisperPayload> for RelayCommand {
    type Error = BridgeError;

    fn try_from(p: WhisperPayload) -> Result<Self> {
        for (field, value) in [("from", &p.from), ("to", &p.to), ("message", &p.message)] {
            if value.trim().is_empty() {
                return Err(BridgeError::Validation(format!(
                    "missing or empty field `{}`",
                    field
                )));
            }
        }
        let to: Recipient = p.to.trim().parse()?;
        Ok(Self::new(p.from, to, p.message))
    }
}

/// Parse `<marker><to> <body>`.
///
/// The marker is stripped, the text is split on the first whitespace, the
/// token before it is the addressee (`*` when empty) and the trimmed rest is
/// the body.
pub fn parse_external_command(
    raw: &str,
    marker: char,
    from: &str,
) -> std::result::Result<RelayCommand, ParseError> {
    let rest = raw
        .strip_prefix(marker)
        .ok_or(ParseError::MissingMarker(marker))?;

    let (token, remainder) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let body = remainder.trim();
    if body.is_empty() {
        return Err(ParseError::EmptyBody);
    }

    // Only an empty token fails to parse, and that means broadcast
    let to = token.parse().unwrap_or(Recipient::Broadcast);
    Ok(RelayCommand::new(from, to, body))
}
