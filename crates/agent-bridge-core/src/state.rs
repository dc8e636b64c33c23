//! Agent lifecycle states.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Lifecycle state reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Loading,
    /// Agent is initialized and ready to start a task.
    #[default]
    Init,
    Running,
    AwaitingUserInput,
    Paused,
    Stopped,
    Finished,
    Error,
}

impl AgentState {
    /// Every state, in wire order.
    pub const ALL: [Self; 8] = [
        Self::Loading,
        Self::Init,
        Self::Running,
        Self::AwaitingUserInput,
        Self::Paused,
        Self::Stopped,
        Self::Finished,
        Self::Error,
    ];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Init => "init",
            Self::Running => "running",
            Self::AwaitingUserInput => "awaiting_user_input",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
            Self::Error => "error",
        }
    }

    /// Whether no task is considered active in this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Init | Self::Finished | Self::Stopped | Self::Error)
    }

    /// Interpret user text as a state command.
    ///
    /// Only an exact match of a state's wire name (ignoring surrounding
    /// whitespace) counts as a command.
    #[must_use]
    pub fn parse_command(text: &str) -> Option<Self> {
        text.trim().parse().ok()
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unrecognized state name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown agent state: {0}")]
pub struct UnknownAgentState(pub String);

impl FromStr for AgentState {
    type Err = UnknownAgentState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| UnknownAgentState(s.to_string()))
    }
}
