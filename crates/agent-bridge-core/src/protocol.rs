//! Wire protocol between the bridge and the agent.
//!
//! Every frame is a single JSON object. A frame carrying an `action` key is an
//! [`ActionMessage`], one carrying an `observation` key is an
//! [`ObservationMessage`]. Anything else is rejected.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::AgentState;

/// Action discriminants understood by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Initialize,
    Start,
    Message,
    Read,
    Write,
    Run,
    RunIpython,
    Kill,
    Browse,
    Recall,
    Finish,
    AddTask,
    ModifyTask,
    ChangeAgentState,
    ClearMessages,
}

impl ActionType {
    const ALL: [Self; 15] = [
        Self::Initialize,
        Self::Start,
        Self::Message,
        Self::Read,
        Self::Write,
        Self::Run,
        Self::RunIpython,
        Self::Kill,
        Self::Browse,
        Self::Recall,
        Self::Finish,
        Self::AddTask,
        Self::ModifyTask,
        Self::ChangeAgentState,
        Self::ClearMessages,
    ];

    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Message => "message",
            Self::Read => "read",
            Self::Write => "write",
            Self::Run => "run",
            Self::RunIpython => "run_ipython",
            Self::Kill => "kill",
            Self::Browse => "browse",
            Self::Recall => "recall",
            Self::Finish => "finish",
            Self::AddTask => "add_task",
            Self::ModifyTask => "modify_task",
            Self::ChangeAgentState => "change_agent_state",
            Self::ClearMessages => "clear_messages",
        }
    }

    /// Look up a discriminant by its wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

/// Observation discriminants emitted by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObservationType {
    Read,
    Write,
    Browse,
    Run,
    RunIpython,
    Recall,
    Chat,
    AgentStateChanged,
}

impl ObservationType {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Browse => "browse",
            Self::Run => "run",
            Self::RunIpython => "run_ipython",
            Self::Recall => "recall",
            Self::Chat => "chat",
            Self::AgentStateChanged => "agent_state_changed",
        }
    }

    /// Look up a discriminant by its wire name.
    #[must_use]
    pub fn from_wire(name: &str) -> Option<Self> {
        [
            Self::Read,
            Self::Write,
            Self::Browse,
            Self::Run,
            Self::RunIpython,
            Self::Recall,
            Self::Chat,
            Self::AgentStateChanged,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == name)
    }
}

/// An action performed by the agent, or a command directed at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Map<String, Value>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub message: String,
}

/// Explicit `null` decodes like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ActionMessage {
    /// Create an action with the given arguments and no message.
    #[must_use]
    pub fn new(kind: ActionType, args: Map<String, Value>) -> Self {
        Self {
            action: kind.as_str().to_string(),
            args,
            message: String::new(),
        }
    }

    /// Typed view of the discriminant, if it is a known one.
    #[must_use]
    pub fn kind(&self) -> Option<ActionType> {
        ActionType::from_wire(&self.action)
    }

    /// String argument by key.
    #[must_use]
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    /// Boolean argument by key. Missing or non-boolean values read as `false`.
    #[must_use]
    pub fn arg_flag(&self, key: &str) -> bool {
        self.args.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Something the agent observed, including its own lifecycle changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationMessage {
    pub observation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ObservationMessage {
    /// Typed view of the discriminant, if it is a known one.
    #[must_use]
    pub fn kind(&self) -> Option<ObservationType> {
        ObservationType::from_wire(&self.observation)
    }

    /// Whether this is a lifecycle change notification.
    #[must_use]
    pub fn is_state_change(&self) -> bool {
        self.kind() == Some(ObservationType::AgentStateChanged)
    }

    /// Raw `extras.agent_state` value of a lifecycle change notification.
    #[must_use]
    pub fn reported_state(&self) -> Option<&str> {
        if !self.is_state_change() {
            return None;
        }
        self.extras.as_ref()?.get("agent_state")?.as_str()
    }

    /// Parsed `extras.agent_state`, if present and recognized.
    #[must_use]
    pub fn agent_state(&self) -> Option<AgentState> {
        self.reported_state().and_then(|s| s.parse().ok())
    }
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Action(ActionMessage),
    Observation(ObservationMessage),
}

impl Message {
    /// Decode a text frame.
    ///
    /// # Errors
    /// Returns error if the frame is not a JSON object carrying either an
    /// `action` or an `observation` key.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(frame).map_err(|e| ProtocolError::Malformed {
            reason: e.to_string(),
            frame: frame.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Decode an already-parsed frame.
    ///
    /// # Errors
    /// Returns error if the value is not an object carrying either an
    /// `action` or an `observation` key, or if the fields have the wrong shape.
    pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
        let Some(object) = value.as_object() else {
            return Err(ProtocolError::Malformed {
                reason: "frame is not a JSON object".to_string(),
                frame: value.to_string(),
            });
        };

        let malformed = |e: serde_json::Error, value: &Value| ProtocolError::Malformed {
            reason: e.to_string(),
            frame: value.to_string(),
        };

        if object.contains_key("action") {
            serde_json::from_value(value.clone())
                .map(Self::Action)
                .map_err(|e| malformed(e, &value))
        } else if object.contains_key("observation") {
            serde_json::from_value(value.clone())
                .map(Self::Observation)
                .map_err(|e| malformed(e, &value))
        } else {
            Err(ProtocolError::MissingDiscriminant {
                frame: value.to_string(),
            })
        }
    }

    /// Encode to a text frame.
    ///
    /// # Errors
    /// Returns error if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        match self {
            Self::Action(action) => serde_json::to_string(action),
            Self::Observation(observation) => serde_json::to_string(observation),
        }
        .map_err(ProtocolError::Encode)
    }
}

impl From<ActionMessage> for Message {
    fn from(action: ActionMessage) -> Self {
        Self::Action(action)
    }
}

impl From<ObservationMessage> for Message {
    fn from(observation: ObservationMessage) -> Self {
        Self::Observation(observation)
    }
}

/// Protocol error.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame ({reason}): {frame}")]
    Malformed { reason: String, frame: String },
    #[error("Frame has neither an action nor an observation key: {frame}")]
    MissingDiscriminant { frame: String },
    #[error("Failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ProtocolError {
    /// The offending frame, for diagnostics.
    #[must_use]
    pub fn frame(&self) -> Option<&str> {
        match self {
            Self::Malformed { frame, .. } | Self::MissingDiscriminant { frame } => Some(frame),
            Self::Encode(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_action() {
        let frame = r#"{"action":"message","args":{"content":"hi","wait_for_response":true},"message":"asking"}"#;
        let Message::Action(action) = Message::decode(frame).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(action.kind(), Some(ActionType::Message));
        assert_eq!(action.arg_str("content"), Some("hi"));
        assert!(action.arg_flag("wait_for_response"));
        assert_eq!(action.message, "asking");
    }

    #[test]
    fn test_decode_action_defaults() {
        let Message::Action(action) = Message::decode(r#"{"action":"finish"}"#).unwrap() else {
            panic!("Wrong message type");
        };
        assert!(action.args.is_empty());
        assert!(action.message.is_empty());
        assert!(!action.arg_flag("wait_for_response"));
    }

    #[test]
    fn test_decode_action_null_fields() {
        let Message::Action(action) =
            Message::decode(r#"{"action":"finish","args":null,"message":"done"}"#).unwrap()
        else {
            panic!("Wrong message type");
        };
        assert_eq!(action.kind(), Some(ActionType::Finish));
        assert!(action.args.is_empty());
        assert_eq!(action.message, "done");

        let Message::Action(action) =
            Message::decode(r#"{"action":"finish","args":{},"message":null}"#).unwrap()
        else {
            panic!("Wrong message type");
        };
        assert!(action.args.is_empty());
        assert!(action.message.is_empty());
    }

    #[test]
    fn test_action_type_wire_names() {
        for kind in ActionType::ALL {
            assert_eq!(ActionType::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionType::RunIpython.as_str(), "run_ipython");
        assert_eq!(ActionType::from_wire("teleport"), None);
    }

    #[test]
    fn test_decode_state_change() {
        let frame = r#"{"observation":"agent_state_changed","content":"","extras":{"agent_state":"running"}}"#;
        let Message::Observation(obs) = Message::decode(frame).unwrap() else {
            panic!("Wrong message type");
        };
        assert!(obs.is_state_change());
        assert_eq!(obs.agent_state(), Some(AgentState::Running));
        assert!(obs.message.is_none());
    }

    #[test]
    fn test_agent_state_requires_state_change_observation() {
        let obs = ObservationMessage {
            observation: "run".to_string(),
            content: None,
            extras: Some(json!({"agent_state": "running"}).as_object().unwrap().clone()),
            message: None,
        };
        assert_eq!(obs.agent_state(), None);
    }

    #[test]
    fn test_decode_missing_discriminant() {
        let err = Message::decode(r#"{"args":{}}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingDiscriminant { .. }));
        assert_eq!(err.frame(), Some(r#"{"args":{}}"#));
    }

    #[test]
    fn test_decode_not_json() {
        let err = Message::decode("not json").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
        assert_eq!(err.frame(), Some("not json"));
    }

    #[test]
    fn test_decode_wrong_shape() {
        let err = Message::decode(r#"{"action":42}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));

        let err = Message::decode("[1,2]").unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed { .. }));
    }

    #[test]
    fn test_action_key_wins_over_observation() {
        let frame = r#"{"action":"run","observation":"run","args":{}}"#;
        assert!(matches!(Message::decode(frame).unwrap(), Message::Action(_)));
    }

    #[test]
    fn test_unknown_kind_is_preserved() {
        let frame = r#"{"action":"teleport","args":{"to":"mars"}}"#;
        let msg = Message::decode(frame).unwrap();
        let Message::Action(action) = &msg else {
            panic!("Wrong message type");
        };
        assert_eq!(action.kind(), None);
        let back = Message::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_encode_omits_empty_fields() {
        let action = ActionMessage::new(ActionType::ClearMessages, Map::new());
        let json = Message::from(action).encode().unwrap();
        assert_eq!(json, r#"{"action":"clear_messages","args":{}}"#);
    }

    #[test]
    fn test_action_type_names() {
        assert_eq!(ActionType::ChangeAgentState.as_str(), "change_agent_state");
        assert_eq!(ActionType::from_wire("run_ipython"), Some(ActionType::RunIpython));
        assert_eq!(ObservationType::from_wire("agent_state_changed"), Some(ObservationType::AgentStateChanged));
        assert_eq!(ObservationType::from_wire("nope"), None);
    }
}
