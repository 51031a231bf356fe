use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::command::{RelayCommand, WhisperPayload};
use crate::config::RelayConfig;
use crate::{BridgeError, Result};

/// HTTP client for the `/osc` endpoint of another process hosting a bus
#[derive(Clone)]
pub struct RelayClient {
    http: Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl RelayClient {
    pub fn new(cfg: &RelayConfig) -> Result<Self> {
        let base = cfg
            .target_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| BridgeError::Config("relay target URL is not set".into()))?;
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/osc", base.trim_end_matches('/')),
            auth_token: cfg.auth_token.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST one whisper. Any transport error, timeout or non-2xx status is a
    /// [`BridgeError::Delivery`].
    pub async fn send(&self, cmd: &RelayCommand) -> Result<()> {
        let failure = |reason: String| BridgeError::Delivery {
            from: cmd.from.clone(),
            to: cmd.to.to_string(),
            reason,
        };

        let mut req = self.http.post(&self.endpoint).json(&WhisperPayload::from(cmd));
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| failure(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(failure(format!("endpoint answered {}", status)));
        }
        debug!(target: "relay", endpoint = %self.endpoint, to = %cmd.to, "Whisper relayed");
        Ok(())
    }
}
