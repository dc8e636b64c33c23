//! Per-conversation agent lifecycle and turn routing.
//!
//! The machine performs no I/O. Every input returns the list of effects the
//! owning session must carry out, in order.

use std::mem;

use agent_bridge_core::{
    ActionMessage, AgentState, CommandBuilder, Message, Notification, ObservationMessage,
};

use crate::present::{is_unconditional, present};

/// Reply when a task is stopped.
pub const REPLY_TASK_STOPPED: &str = "Task stopped.";
/// Reply when a control command arrives with no task running.
pub const REPLY_NO_TASK: &str = "There is no task running. Please start a task first.";
/// Reply when a new task arrives while another one runs.
pub const REPLY_BUSY: &str = "There is already a task running. Please wait until it finishes. Or use a command to interrupt it.";
/// Reply to a control command other than `stopped` while a task runs.
pub const REPLY_UNSUPPORTED: &str = "Only the `stopped` command is supported while a task is running.";
/// Reply when a command could not reach the agent.
pub const REPLY_UNREACHABLE: &str = "The agent could not be reached. Please try again later.";

/// Work the session performs on behalf of the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a command to the agent.
    Send(ActionMessage),
    /// Answer the current turn directly.
    Reply(String),
    /// Post a notification into the conversation.
    Notify(Notification),
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: AgentState,
    /// Most recently recorded task text.
    pub task: Option<String>,
    /// An initialize command is awaiting the agent's `init`.
    pub pending_start: bool,
    /// The start command went out and the agent has not left `init` yet.
    pub start_sent: bool,
}

/// Agent lifecycle state plus the routing rules for turns and events.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    commands: CommandBuilder,
    state: AgentState,
    task: Option<String>,
    pending_start: bool,
    start_sent: bool,
}

impl SessionStateMachine {
    /// Create an idle machine.
    #[must_use]
    pub fn new(commands: CommandBuilder) -> Self {
        Self {
            commands,
            state: AgentState::default(),
            task: None,
            pending_start: false,
            start_sent: false,
        }
    }

    /// Current agent state.
    #[must_use]
    pub const fn state(&self) -> AgentState {
        self.state
    }

    /// Whether the agent is running a task.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    /// Whether a new task would be refused.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.has_task() || self.pending_start
    }

    /// The agent runs a task, or was told to start one while still in `init`.
    const fn has_task(&self) -> bool {
        self.is_active() || self.start_sent
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            task: self.task.clone(),
            pending_start: self.pending_start,
            start_sent: self.start_sent,
        }
    }

    /// Route one user turn.
    pub fn handle_turn(&mut self, text: &str) -> Vec<Effect> {
        if let Some(command) = AgentState::parse_command(text) {
            return self.handle_command(command);
        }

        if self.state == AgentState::AwaitingUserInput {
            return vec![Effect::Send(self.commands.send_message(text))];
        }

        if self.is_busy() {
            return vec![Effect::Reply(REPLY_BUSY.to_string())];
        }

        self.task = Some(text.to_string());
        self.pending_start = true;
        vec![Effect::Send(self.commands.initialize())]
    }

    fn handle_command(&mut self, command: AgentState) -> Vec<Effect> {
        match command {
            AgentState::Stopped if self.has_task() => vec![
                Effect::Send(self.commands.stop_task()),
                Effect::Reply(REPLY_TASK_STOPPED.to_string()),
            ],
            AgentState::Stopped if self.pending_start => {
                self.pending_start = false;
                vec![Effect::Reply(REPLY_TASK_STOPPED.to_string())]
            }
            _ if self.has_task() => vec![Effect::Reply(REPLY_UNSUPPORTED.to_string())],
            _ => vec![Effect::Reply(REPLY_NO_TASK.to_string())],
        }
    }

    /// Route one decoded agent message.
    pub fn handle_event(&mut self, message: &Message) -> Vec<Effect> {
        if let Message::Observation(observation) = message {
            if observation.is_state_change() {
                return self.apply_state_change(observation);
            }
        }

        let surfaced = is_unconditional(message) || self.state.is_terminal();
        match present(message) {
            Some(notification) if surfaced => vec![Effect::Notify(notification)],
            _ => Vec::new(),
        }
    }

    /// Adopt a state recovered from replay, without side effects.
    pub fn resync(&mut self, state: AgentState) {
        if state != self.state {
            tracing::debug!(from = %self.state, to = %state, "Resynchronized agent state");
        }
        self.state = state;
    }

    /// The socket went away; a pending start will never be acknowledged.
    pub fn connection_lost(&mut self) {
        self.pending_start = false;
        self.start_sent = false;
    }

    /// A command never reached the agent.
    pub fn command_dropped(&mut self) {
        self.pending_start = false;
        self.start_sent = false;
    }

    fn apply_state_change(&mut self, observation: &ObservationMessage) -> Vec<Effect> {
        let Some(raw) = observation.reported_state() else {
            return Vec::new();
        };
        let Ok(state) = raw.parse::<AgentState>() else {
            tracing::warn!(agent_state = raw, "Ignoring unknown agent state");
            return Vec::new();
        };

        let previous = mem::replace(&mut self.state, state);
        tracing::debug!(from = %previous, to = %state, "Agent state changed");

        match state {
            AgentState::Init if self.pending_start => {
                self.pending_start = false;
                let Some(task) = self.task.as_deref() else {
                    return Vec::new();
                };
                self.start_sent = true;
                vec![
                    Effect::Send(self.commands.clear_messages()),
                    Effect::Send(self.commands.start(task)),
                ]
            }
            // A repeated `init` while the start is in flight.
            AgentState::Init => Vec::new(),
            AgentState::Finished | AgentState::Stopped | AgentState::Error => {
                self.pending_start = false;
                self.start_sent = false;
                Vec::new()
            }
            _ => {
                self.start_sent = false;
                Vec::new()
            }
        }
    }
}
