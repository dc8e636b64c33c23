//! Outbound command constructors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ActionMessage, ActionType, AgentState};

/// Agent settings sent with the initialize command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Model the agent should use (`LLM_MODEL`).
    pub llm_model: String,
    /// Agent implementation to run (`AGENT`).
    pub agent: String,
    /// Conversation language (`LANGUAGE`).
    pub language: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            llm_model: "gpt-4o".to_string(),
            agent: "PlannerAgent".to_string(),
            language: "English".to_string(),
        }
    }
}

/// Builder for the commands the bridge sends to the agent.
///
/// Every constructor is pure and returns a fresh [`ActionMessage`].
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    settings: AgentSettings,
}

impl CommandBuilder {
    /// Create a builder using the given initialize settings.
    #[must_use]
    pub const fn new(settings: AgentSettings) -> Self {
        Self { settings }
    }

    /// Settings used by [`Self::initialize`].
    #[must_use]
    pub const fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Ask the agent to (re)initialize.
    #[must_use]
    pub fn initialize(&self) -> ActionMessage {
        ActionMessage::new(
            ActionType::Initialize,
            args([
                ("LLM_MODEL", self.settings.llm_model.as_str()),
                ("AGENT", self.settings.agent.as_str()),
                ("LANGUAGE", self.settings.language.as_str()),
            ]),
        )
    }

    /// Start a task.
    #[must_use]
    pub fn start(&self, task: &str) -> ActionMessage {
        ActionMessage::new(ActionType::Start, args([("task", task)]))
    }

    /// Reply to an agent waiting on user input.
    #[must_use]
    pub fn send_message(&self, content: &str) -> ActionMessage {
        ActionMessage::new(ActionType::Message, args([("content", content)]))
    }

    /// Clear the agent's message buffer.
    #[must_use]
    pub fn clear_messages(&self) -> ActionMessage {
        ActionMessage::new(ActionType::ClearMessages, Map::new())
    }

    /// Interrupt the running task.
    #[must_use]
    pub fn stop_task(&self) -> ActionMessage {
        ActionMessage::new(
            ActionType::ChangeAgentState,
            args([("agent_state", AgentState::Stopped.as_str())]),
        )
    }
}

fn args<const N: usize>(pairs: [(&str, &str); N]) -> Map<String, Value> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
