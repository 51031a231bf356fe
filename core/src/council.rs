//! The guardian council: Lilybear, Serafina and ShadowFlowers.
//!
//! Lilybear is the operations hub and re-broadcasts `/route ` commands.
//! Serafina handles comms and asks ShadowFlowers for a blessing when told to
//! `bless`. ShadowFlowers shows the blessing and reports back to Lilybear.

use crate::agent::Agent;
use crate::bus::WhisperBus;
use crate::display::TextDisplay;
use crate::message::{AgentName, Recipient};
use crate::reaction::{Effect, ReactionTable, Trigger};
use crate::Result;
use std::sync::Arc;
use tracing::info;

pub const LILYBEAR: &str = "Lilybear";
pub const SERAFINA: &str = "Serafina";
pub const SHADOW_FLOWERS: &str = "ShadowFlowers";

pub const ROUTE_PREFIX: &str = "/route ";
pub const BLESSING_REQUEST: &str = "Please deliver a blessing to the hall.";
pub const BLESSING_LINE: &str = "\u{1F338} May your path be protected and your heart be held.";
pub const BLESSING_DELIVERED: &str = "Blessing delivered.";

pub fn lilybear_reactions() -> ReactionTable {
    ReactionTable::new().rule(
        Trigger::StartsWith(ROUTE_PREFIX.into()),
        Effect::ForwardRemainder {
            to: Recipient::Broadcast,
        },
    )
}

pub fn serafina_reactions() -> Result<ReactionTable> {
    Ok(ReactionTable::new().rule(
        Trigger::StartsWith("bless".into()),
        Effect::Whisper {
            to: Recipient::agent(SHADOW_FLOWERS)?,
            body: BLESSING_REQUEST.into(),
        },
    ))
}

pub fn shadow_flowers_reactions() -> Result<ReactionTable> {
    Ok(ReactionTable::new()
        .rule(
            Trigger::Contains("blessing".into()),
            Effect::Display {
                text: BLESSING_LINE.into(),
            },
        )
        .rule(
            Trigger::Contains("blessing".into()),
            Effect::Whisper {
                to: Recipient::agent(LILYBEAR)?,
                body: BLESSING_DELIVERED.into(),
            },
        ))
}

/// The three guardians, active on one bus
#[derive(Debug)]
pub struct Council {
    agents: Vec<Arc<Agent>>,
}

impl Council {
    /// Build and activate the council. `display` is where ShadowFlowers shows
    /// blessings.
    pub fn assemble(bus: Arc<WhisperBus>, display: Arc<dyn TextDisplay>) -> Result<Self> {
        let agents = vec![
            Agent::new(
                AgentName::new(LILYBEAR)?,
                "Voice & Operations",
                bus.clone(),
                lilybear_reactions(),
            ),
            Agent::new(
                AgentName::new(SERAFINA)?,
                "Comms & Routing",
                bus.clone(),
                serafina_reactions()?,
            ),
            Agent::with_display(
                AgentName::new(SHADOW_FLOWERS)?,
                "Sentiment & Rituals",
                bus,
                shadow_flowers_reactions()?,
                display,
            ),
        ];
        for agent in &agents {
            agent.activate();
        }
        info!(target: "agent", members = agents.len(), "Council assembled");
        Ok(Self { agents })
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn dismiss(&self) {
        for agent in &self.agents {
            agent.deactivate();
        }
        info!(target: "agent", "Council dismissed");
    }
}

impl Drop for Council {
    // Active agents and the bus hold each other; unsubscribing breaks the cycle
    fn drop(&mut self) {
        if self.agents.iter().any(|a| a.is_active()) {
            self.dismiss();
        }
    }
}
