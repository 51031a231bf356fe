//! Single dispatch queue in front of a shared bus.
//!
//! Network tasks never call [`WhisperBus::publish`] themselves; they hand the
//! whisper to this queue and one dispatcher task publishes them in arrival
//! order, so dispatches never interleave.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use whisper_core::{DispatchReport, WhisperBus, WhisperMessage};

use crate::{BridgeError, Result};

struct Dispatch {
    msg: WhisperMessage,
    reply: Option<oneshot::Sender<DispatchReport>>,
}

#[derive(Clone)]
pub struct DispatchQueue {
    tx: mpsc::Sender<Dispatch>,
}

impl DispatchQueue {
    /// Start the dispatcher task. It runs until every queue handle is dropped.
    pub fn spawn(bus: Arc<WhisperBus>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Dispatch>(capacity.max(1));
        let handle = tokio::spawn(async move {
            info!(target: "ingest", "Dispatch queue started");
            while let Some(Dispatch { msg, reply }) = rx.recv().await {
                let report = bus.publish(&msg);
                debug!(target: "ingest", delivered = report.delivered, faulted = report.faulted, "Dispatched");
                if let Some(reply) = reply {
                    // Caller may have gone away; nothing to do then
                    let _ = reply.send(report);
                }
            }
            info!(target: "ingest", "Dispatch queue stopped");
        });
        (Self { tx }, handle)
    }

    /// Queue `msg` and wait until it has been dispatched
    pub async fn publish(&self, msg: WhisperMessage) -> Result<DispatchReport> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Dispatch {
                msg,
                reply: Some(reply),
            })
            .await
            .map_err(|_| BridgeError::QueueClosed)?;
        done.await.map_err(|_| BridgeError::QueueClosed)
    }

    /// Queue `msg` without waiting for its dispatch
    pub async fn enqueue(&self, msg: WhisperMessage) -> Result<()> {
        self.tx
            .send(Dispatch { msg, reply: None })
            .await
            .map_err(|_| {
                warn!(target: "ingest", "Dispatch queue closed; whisper dropped");
                BridgeError::QueueClosed
            })
    }
}
