// Relay bridge: external commands in, local whispers out
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use whisper_core::{Recipient, SubscriptionHandle, WhisperBus, WhisperHandler, WhisperMessage};

use crate::client::RelayClient;
use crate::command::{parse_external_command, ParseError, RelayCommand};
use crate::config::BridgeConfig;
use crate::gate::{ChannelGate, ChatMessage};
use crate::queue::DispatchQueue;
use crate::Result;

/// Where ingested commands go
#[derive(Clone)]
pub enum RelayTarget {
    /// Bus in this process, behind its dispatch queue
    Local(DispatchQueue),
    /// Bus in another process, reached over HTTP
    Remote(RelayClient),
    /// No target configured; ingest drops silently
    Disabled,
}

/// What happened to an ingested command
#[derive(Debug)]
pub enum IngestOutcome {
    Queued,
    /// Outbound call running in the background
    Spawned(JoinHandle<()>),
    Dropped,
}

pub struct RelayBridge {
    target: RelayTarget,
    gate: ChannelGate,
}

impl RelayBridge {
    pub fn new(target: RelayTarget, gate: ChannelGate) -> Self {
        Self { target, gate }
    }

    /// Remote when a target URL is configured, else the local queue if given,
    /// else disabled.
    pub fn from_config(cfg: &BridgeConfig, local: Option<DispatchQueue>) -> Result<Self> {
        let gate = ChannelGate::new(cfg.gate.channel_id.clone(), cfg.gate.marker);
        let target = if cfg.relay.outbound_enabled() {
            cfg.validate()?;
            RelayTarget::Remote(RelayClient::new(&cfg.relay)?)
        } else if let Some(queue) = local {
            RelayTarget::Local(queue)
        } else {
            info!(target: "relay", "No relay target configured; relay disabled");
            RelayTarget::Disabled
        };
        Ok(Self::new(target, gate))
    }

    pub fn gate(&self) -> &ChannelGate {
        &self.gate
    }

    pub fn target(&self) -> &RelayTarget {
        &self.target
    }

    /// Forward `cmd` to the target. Never waits on the network: remote calls
    /// run in a spawned task bounded by the client timeout, and failures are
    /// logged and dropped.
    pub async fn ingest(&self, cmd: RelayCommand) -> IngestOutcome {
        match &self.target {
            RelayTarget::Local(queue) => match queue.enqueue(cmd.into_whisper()).await {
                Ok(()) => IngestOutcome::Queued,
                Err(_) => IngestOutcome::Dropped,
            },
            RelayTarget::Remote(client) => {
                IngestOutcome::Spawned(spawn_delivery(Handle::current(), client.clone(), cmd))
            }
            RelayTarget::Disabled => {
                debug!(target: "relay", to = %cmd.to, "Relay disabled; command dropped");
                IngestOutcome::Dropped
            }
        }
    }

    /// Gate, parse and ingest one chat message. Returns `None` when the
    /// message is not a relay command or fails to parse.
    pub async fn handle_chat_message(&self, msg: &ChatMessage) -> Option<IngestOutcome> {
        if !self.gate.admits(msg) {
            return None;
        }
        match parse_external_command(&msg.content, self.gate.marker(), &msg.author) {
            Ok(cmd) => Some(self.ingest(cmd).await),
            Err(ParseError::EmptyBody) => {
                debug!(target: "relay", author = %msg.author, "Relay command without body dropped");
                None
            }
            Err(e) => {
                warn!(target: "relay", author = %msg.author, error = %e, "Unparseable relay command dropped");
                None
            }
        }
    }
}

fn spawn_delivery(runtime: Handle, client: RelayClient, cmd: RelayCommand) -> JoinHandle<()> {
    runtime.spawn(async move {
        if let Err(e) = client.send(&cmd).await {
            warn!(
                target: "relay",
                from = %cmd.from,
                to = %cmd.to,
                body = %cmd.body,
                error = %e,
                "Failed to relay whisper"
            );
        }
    })
}

/// Bus tap that forwards whispers sent by this bus's own agents
struct OutboundMirror {
    bus: Weak<WhisperBus>,
    client: RelayClient,
    runtime: Handle,
}

impl WhisperHandler for OutboundMirror {
    fn on_whisper(&self, msg: &WhisperMessage) -> whisper_core::Result<()> {
        // Whispers that arrived from outside are not sent back out, even when
        // the sender shares a name with a local agent
        if msg.is_relayed() {
            return Ok(());
        }
        let local = self
            .bus
            .upgrade()
            .map_or(false, |bus| bus.registry().is_live(msg.from()));
        if local {
            spawn_delivery(self.runtime.clone(), self.client.clone(), RelayCommand::from(msg));
        }
        Ok(())
    }
}

/// Mirror local agent traffic to the remote relay target. Must be called from
/// within a tokio runtime.
pub fn mirror_outbound(bus: &Arc<WhisperBus>, client: RelayClient) -> SubscriptionHandle {
    info!(target: "relay", endpoint = %client.endpoint(), "Mirroring outbound whispers");
    let tap = OutboundMirror {
        bus: Arc::downgrade(bus),
        client,
        runtime: Handle::current(),
    };
    bus.subscribe(Recipient::Broadcast, Arc::new(tap))
}
