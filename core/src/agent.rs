// Agent implementation
use crate::bus::{DispatchReport, SubscriptionHandle, WhisperBus, WhisperHandler};
use crate::display::TextDisplay;
use crate::message::{AgentName, Recipient, WhisperMessage};
use crate::Result;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// What an agent does with a whisper addressed to it
pub trait Reaction: Send + Sync {
    fn on_message(&self, agent: &Agent, from: &str, body: &str) -> Result<()>;
}

impl<F> Reaction for F
where
    F: Fn(&Agent, &str, &str) -> Result<()> + Send + Sync,
{
    fn on_message(&self, agent: &Agent, from: &str, body: &str) -> Result<()> {
        self(agent, from, body)
    }
}

/// Named subscriber on a [`WhisperBus`].
///
/// Every agent shares the same subscribe/filter/whisper behaviour; only the
/// name, role and [`Reaction`] differ.
pub struct Agent {
    name: AgentName,
    role: String,
    bus: Arc<WhisperBus>,
    reaction: Box<dyn Reaction>,
    display: Option<Arc<dyn TextDisplay>>,
    last_message: RwLock<Option<String>>,
    subscription: Mutex<Option<SubscriptionHandle>>,
}

impl Agent {
    pub fn new(
        name: AgentName,
        role: impl Into<String>,
        bus: Arc<WhisperBus>,
        reaction: impl Reaction + 'static,
    ) -> Arc<Self> {
        Arc::new(Self::build(name, role.into(), bus, Box::new(reaction), None))
    }

    pub fn with_display(
        name: AgentName,
        role: impl Into<String>,
        bus: Arc<WhisperBus>,
        reaction: impl Reaction + 'static,
        display: Arc<dyn TextDisplay>,
    ) -> Arc<Self> {
        Arc::new(Self::build(
            name,
            role.into(),
            bus,
            Box::new(reaction),
            Some(display),
        ))
    }

    fn build(
        name: AgentName,
        role: String,
        bus: Arc<WhisperBus>,
        reaction: Box<dyn Reaction>,
        display: Option<Arc<dyn TextDisplay>>,
    ) -> Self {
        Self {
            name,
            role,
            bus,
            reaction,
            display,
            last_message: RwLock::new(None),
            subscription: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &AgentName {
        &self.name
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// Subscribe to the bus under this agent's name. Activating twice keeps a
    /// single subscription.
    pub fn activate(self: &Arc<Self>) {
        let mut slot = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            debug!(target: "agent", agent = %self.name, "Already active");
            return;
        }
        let handler: Arc<dyn WhisperHandler> = self.clone();
        *slot = Some(
            self.bus
                .subscribe(Recipient::Agent(self.name.clone()), handler),
        );
        info!(target: "agent", agent = %self.name, role = %self.role, "Agent activated");
    }

    /// Drop the bus subscription; the bus keeps no reference to the agent
    /// afterwards. No-op when inactive.
    pub fn deactivate(&self) {
        let handle = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            self.bus.unsubscribe(&handle);
            info!(target: "agent", agent = %self.name, "Agent deactivated");
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription
            .lock()
            .map(|s| s.is_some())
            .unwrap_or_else(|poisoned| poisoned.into_inner().is_some())
    }

    /// Last whisper seen, formatted as `"{from}: {body}"`
    pub fn last_message(&self) -> Option<String> {
        match self.last_message.read() {
            Ok(m) => m.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Publish `{from: self, to, body}` on the bus
    pub fn send(&self, to: Recipient, body: impl Into<String>) -> DispatchReport {
        let msg = WhisperMessage::new(self.name.as_str(), to, body);
        self.bus.publish(&msg)
    }

    /// Like [`Agent::send`], with the addressee given as a name or `*`
    pub fn whisper(&self, to: &str, body: impl Into<String>) -> Result<DispatchReport> {
        let to: Recipient = to.parse()?;
        Ok(self.send(to, body))
    }

    /// Show text on this agent's display, if it has one
    pub fn display(&self, text: &str) {
        match &self.display {
            Some(d) => d.set_text(text),
            None => debug!(target: "agent", agent = %self.name, "No display attached"),
        }
    }
}

impl WhisperHandler for Agent {
    fn on_whisper(&self, msg: &WhisperMessage) -> Result<()> {
        if !msg.is_addressed_to(&self.name) {
            return Ok(());
        }

        info!(target: "agent", agent = %self.name, from = %msg.from(), "received: {}", msg.body());
        {
            let mut last = self
                .last_message
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            *last = Some(format!("{}: {}", msg.from(), msg.body()));
        }

        self.reaction.on_message(self, msg.from(), msg.body())
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("active", &self.is_active())
            .finish()
    }
}
