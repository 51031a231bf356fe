use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

use crate::{BridgeError, Result};

/// Bridge configuration. Defaults come from environment variables; a TOML
/// file may override them.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Address the ingestion server listens on
    pub listen_addr: String,
    /// Capacity of the dispatch queue in front of the bus
    pub queue_capacity: usize,
    pub gate: GateConfig,
    pub relay: RelayConfig,
}

/// Which chat messages are relay commands
#[derive(Clone, Debug)]
pub struct GateConfig {
    pub channel_id: String,
    pub marker: char,
}

/// Outbound relay to another process's `/osc` endpoint
#[derive(Clone, Debug)]
pub struct RelayConfig {
    /// Unset means outbound relay is a silent no-op
    pub target_url: Option<String>,
    pub timeout_ms: u64,
    pub auth_token: Option<String>,
    /// Forward whispers of local agents to the target
    pub mirror: bool,
}

/// Log filter used when `RUST_LOG` is unset. Directives key on the event
/// targets, not on crate paths.
pub const DEFAULT_LOG_FILTER: &str =
    "info,whisper_bus=debug,agent=debug,relay=debug,ingest=debug,dispatcher=debug";

/// Chat channel relay commands are accepted on unless configured otherwise
pub const DEFAULT_CHANNEL: &str = "console";

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            channel_id: env_opt("WHISPER_COUNCIL_CHANNEL")
                .unwrap_or_else(|| DEFAULT_CHANNEL.to_string()),
            marker: env_opt("WHISPER_COMMAND_MARKER")
                .and_then(|m| m.chars().next())
                .unwrap_or('!'),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            target_url: env_opt("WHISPER_RELAY_URL"),
            timeout_ms: env_opt("WHISPER_RELAY_TIMEOUT_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(5_000),
            auth_token: env_opt("WHISPER_RELAY_TOKEN"),
            mirror: env_opt("WHISPER_MIRROR_OUTBOUND")
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen_addr: env_opt("WHISPER_BRIDGE_ADDR")
                .unwrap_or_else(|| "127.0.0.1:7070".to_string()),
            queue_capacity: 1024,
            gate: GateConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn outbound_enabled(&self) -> bool {
        self.target_url.is_some()
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file (path via WHISPER_BRIDGE_CONFIG or
    /// ./whisper_bridge.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("WHISPER_BRIDGE_CONFIG").unwrap_or_else(|_| "whisper_bridge.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "config", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target: "config", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "config", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Overlay a TOML document onto `base`
    pub fn from_toml_str(s: &str, base: Self) -> Result<Self> {
        let t: BridgeToml = toml::from_str(s).map_err(|e| BridgeError::Config(e.to_string()))?;
        Ok(t.overlay(base))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|e| BridgeError::Config(format!("bad listen address '{}': {e}", self.listen_addr)))
    }

    /// Check the settings needed before serving and before any outbound call
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.queue_capacity == 0 {
            return Err(BridgeError::Config("queue_capacity must be positive".into()));
        }
        if self.relay.outbound_enabled() {
            if self.relay.auth_token.as_deref().map_or(true, |t| t.trim().is_empty()) {
                return Err(BridgeError::Config(
                    "relay target set but WHISPER_RELAY_TOKEN is empty".into(),
                ));
            }
            if self.relay.timeout_ms == 0 {
                return Err(BridgeError::Config("relay timeout must be positive".into()));
            }
        }
        Ok(())
    }
}

// ---------------- TOML mapping ----------------

#[derive(Debug, Default, Deserialize)]
struct BridgeToml {
    listen_addr: Option<String>,
    queue_capacity: Option<usize>,
    gate: Option<GateToml>,
    relay: Option<RelayToml>,
}

#[derive(Debug, Default, Deserialize)]
struct GateToml {
    channel_id: Option<String>,
    marker: Option<char>,
}

#[derive(Debug, Default, Deserialize)]
struct RelayToml {
    target_url: Option<String>,
    timeout_ms: Option<u64>,
    auth_token: Option<String>,
    mirror: Option<bool>,
}

impl BridgeToml {
    fn overlay(self, mut base: BridgeConfig) -> BridgeConfig {
        if let Some(v) = self.listen_addr {
            base.listen_addr = v;
        }
        if let Some(v) = self.queue_capacity {
            base.queue_capacity = v;
        }
        if let Some(g) = self.gate {
            if let Some(v) = g.channel_id {
                base.gate.channel_id = v;
            }
            if let Some(v) = g.marker {
                base.gate.marker = v;
            }
        }
        if let Some(r) = self.relay {
            if let Some(v) = r.target_url {
                base.relay.target_url = Some(v).filter(|s| !s.trim().is_empty());
            }
            if let Some(v) = r.timeout_ms {
                base.relay.timeout_ms = v;
            }
            if let Some(v) = r.auth_token {
                base.relay.auth_token = Some(v).filter(|s| !s.trim().is_empty());
            }
            if let Some(v) = r.mirror {
                base.relay.mirror = v;
            }
        }
        base
    }
}
