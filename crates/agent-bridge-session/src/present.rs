//! Mapping of agent messages to notifications.

use agent_bridge_core::{
    ActionMessage, ActionType, Hint, Message, Notification, ObservationMessage, ObservationType,
};

/// Fallback text for a finish action without a message.
const FINISHED_TEXT: &str = "Task finished.";

/// Messages that surface whatever the agent state is.
#[must_use]
pub fn is_unconditional(message: &Message) -> bool {
    match message {
        Message::Action(action) => match action.kind() {
            Some(ActionType::Finish) => true,
            Some(ActionType::Message) => action.arg_flag("wait_for_response"),
            _ => false,
        },
        Message::Observation(_) => false,
    }
}

/// Build the notification for a message, if it has anything to show.
///
/// Lifecycle changes and echoes of the bridge's own commands never produce
/// a notification.
#[must_use]
pub fn present(message: &Message) -> Option<Notification> {
    match message {
        Message::Action(action) => present_action(action),
        Message::Observation(observation) => present_observation(observation),
    }
}

fn present_action(action: &ActionMessage) -> Option<Notification> {
    match action.kind() {
        Some(
            ActionType::Initialize
            | ActionType::Start
            | ActionType::ChangeAgentState
            | ActionType::ClearMessages,
        ) => None,
        Some(ActionType::Finish) => {
            let text = non_empty(Some(&action.message)).unwrap_or(FINISHED_TEXT);
            Some(Notification::new(text, Hint::Success).important())
        }
        Some(ActionType::Message) => {
            let content = non_empty(action.arg_str("content"))?;
            let hint = if action.arg_flag("wait_for_response") {
                Hint::Question
            } else {
                Hint::Idea
            };
            Some(Notification::new(content, hint))
        }
        _ => non_empty(action.arg_str("thought")).map(|thought| Notification::new(thought, Hint::Note)),
    }
}

fn present_observation(observation: &ObservationMessage) -> Option<Notification> {
    let text = non_empty(observation.message.as_deref())?;
    match observation.kind() {
        Some(ObservationType::AgentStateChanged) => None,
        Some(ObservationType::Write) => Some(Notification::new(text, Hint::File)),
        _ => Some(Notification::new(text, Hint::Note)),
    }
}

fn non_empty<S: AsRef<str> + ?Sized>(text: Option<&S>) -> Option<&str> {
    text.map(AsRef::as_ref).filter(|t| !t.trim().is_empty())
}
