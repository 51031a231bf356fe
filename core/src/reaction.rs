// Rule-based reactions
use crate::agent::{Agent, Reaction};
use crate::message::Recipient;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What part of a whisper body a rule looks at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    StartsWith(String),
    Contains(String),
}

impl Trigger {
    fn matches(&self, body: &str) -> bool {
        match self {
            Trigger::StartsWith(prefix) => body.starts_with(prefix.as_str()),
            Trigger::Contains(needle) => body.contains(needle.as_str()),
        }
    }

    /// Body with the matched prefix removed; `Contains` keeps the whole body
    fn remainder<'a>(&self, body: &'a str) -> &'a str {
        match self {
            Trigger::StartsWith(prefix) => body.strip_prefix(prefix.as_str()).unwrap_or(body),
            Trigger::Contains(_) => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    /// Send a fixed whisper
    Whisper { to: Recipient, body: String },
    /// Send what follows the trigger
    ForwardRemainder { to: Recipient },
    /// Show text on the agent's display
    Display { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub trigger: Trigger,
    pub effect: Effect,
}

/// Ordered list of `(trigger, effect)` rules. Every matching rule fires, in
/// order; the table keeps no state between whispers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionTable {
    rules: Vec<Rule>,
}

impl ReactionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, trigger: Trigger, effect: Effect) -> Self {
        self.rules.push(Rule { trigger, effect });
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Reaction for ReactionTable {
    fn on_message(&self, agent: &Agent, from: &str, body: &str) -> Result<()> {
        for rule in self.rules.iter().filter(|r| r.trigger.matches(body)) {
            debug!(target: "agent", agent = %agent.name(), from = %from, trigger = ?rule.trigger, "Rule matched");
            match &rule.effect {
                Effect::Whisper { to, body: text } => {
                    agent.send(to.clone(), text.clone());
                }
                Effect::ForwardRemainder { to } => {
                    agent.send(to.clone(), rule.trigger.remainder(body));
                }
                Effect::Display { text } => agent.display(text),
            }
        }
        Ok(())
    }
}
