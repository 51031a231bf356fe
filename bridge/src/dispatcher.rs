//! External slash-command surface.
//!
//! One top-level `council` command. `council report now` hands off to an
//! external job runner; `council whisper <to> <message>` goes through the
//! relay bridge. Nothing here does more than look up the routing table.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};
use whisper_core::Recipient;

use crate::command::RelayCommand;
use crate::relay::{IngestOutcome, RelayBridge};
use crate::Result;

pub const COUNCIL_REPORT_JOB: &str = "council-report";
pub const REPORT_ACK: &str = "Summoning council report…";
pub const WHISPER_ACK: &str = "Whisper relayed.";
pub const WHISPER_DROPPED: &str = "Whisper not relayed: no relay target is available.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
    /// Start an external job now; its result never comes back here
    RunJob(&'static str),
    WhisperViaBridge,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandRoute {
    pub command: &'static str,
    pub path: &'static [&'static str],
    pub description: &'static str,
    pub action: CommandAction,
}

pub const ROUTES: &[CommandRoute] = &[
    CommandRoute {
        command: "council",
        path: &["report", "now"],
        description: "Post the nightly council report immediately",
        action: CommandAction::RunJob(COUNCIL_REPORT_JOB),
    },
    CommandRoute {
        command: "council",
        path: &["whisper"],
        description: "Whisper to a guardian (or * for all)",
        action: CommandAction::WhisperViaBridge,
    },
];

/// Runs jobs that live outside this crate (e.g. the nightly council report)
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: String) -> Result<()>;
}

/// One invocation of the command surface
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInvocation {
    pub user: String,
    pub command: String,
    pub path: Vec<String>,
    pub options: BTreeMap<String, String>,
}

impl CommandInvocation {
    pub fn new(user: impl Into<String>, command: impl Into<String>, path: &[&str]) -> Self {
        Self {
            user: user.into(),
            command: command.into(),
            path: path.iter().map(|s| s.to_string()).collect(),
            options: BTreeMap::new(),
        }
    }

    pub fn option(mut self, key: &str, value: impl Into<String>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Parse a typed line such as `/council whisper Serafina bless the hall`.
    /// For whisper routes the word after the path is `to` and the rest is
    /// `message`.
    pub fn parse_slash(line: &str, user: &str) -> Option<Self> {
        let mut words = line.trim().strip_prefix('/')?.split_whitespace();
        let command = words.next()?;
        let rest: Vec<&str> = words.collect();

        let route = ROUTES
            .iter()
            .filter(|r| r.command == command && rest.starts_with(r.path))
            .max_by_key(|r| r.path.len())?;

        let mut inv = Self::new(user, command, route.path);
        let args = &rest[route.path.len()..];
        if route.action == CommandAction::WhisperViaBridge {
            if let Some((to, message)) = args.split_first() {
                inv = inv.option("to", *to);
                if !message.is_empty() {
                    inv = inv.option("message", message.join(" "));
                }
            }
        }
        Some(inv)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    /// Immediate acknowledgement shown only to the caller
    Ack(String),
    Usage(String),
    /// The command was understood but could not be carried out
    Failed(String),
    Unknown,
}

pub struct CommandDispatcher {
    jobs: Arc<dyn JobRunner>,
    bridge: Arc<RelayBridge>,
}

impl CommandDispatcher {
    pub fn new(jobs: Arc<dyn JobRunner>, bridge: Arc<RelayBridge>) -> Self {
        Self { jobs, bridge }
    }

    pub fn routes() -> &'static [CommandRoute] {
        ROUTES
    }

    pub fn route(command: &str, path: &[String]) -> Option<CommandAction> {
        ROUTES
            .iter()
            .find(|r| r.command == command && r.path.iter().eq(path.iter()))
            .map(|r| r.action)
    }

    pub async fn dispatch(&self, inv: CommandInvocation) -> CommandReply {
        let Some(action) = Self::route(&inv.command, &inv.path) else {
            info!(target: "dispatcher", command = %inv.command, path = ?inv.path, "Unknown command");
            return CommandReply::Unknown;
        };

        match action {
            CommandAction::RunJob(job) => {
                info!(target: "dispatcher", user = %inv.user, job, "Starting external job");
                let jobs = Arc::clone(&self.jobs);
                tokio::spawn(async move {
                    match jobs.run(job.to_string()).await {
                        Ok(()) => info!(target: "dispatcher", job, "External job finished"),
                        Err(e) => warn!(target: "dispatcher", job, error = %e, "External job failed"),
                    }
                });
                CommandReply::Ack(REPORT_ACK.to_string())
            }
            CommandAction::WhisperViaBridge => {
                let Some(message) = inv.options.get("message").filter(|m| !m.trim().is_empty())
                else {
                    return CommandReply::Usage(
                        "usage: /council whisper <guardian|*> <message>".to_string(),
                    );
                };
                let to = inv
                    .options
                    .get("to")
                    .and_then(|t| t.parse::<Recipient>().ok())
                    .unwrap_or(Recipient::Broadcast);
                let cmd = RelayCommand::new(inv.user.clone(), to, message.trim());
                match self.bridge.ingest(cmd).await {
                    IngestOutcome::Dropped => {
                        warn!(target: "dispatcher", user = %inv.user, "Whisper command dropped");
                        CommandReply::Failed(WHISPER_DROPPED.to_string())
                    }
                    IngestOutcome::Queued | IngestOutcome::Spawned(_) => {
                        CommandReply::Ack(WHISPER_ACK.to_string())
                    }
                }
            }
        }
    }
}
