//! Conversation references captured from inbound turns.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a conversation, captured when its session is created.
///
/// Used to deliver notifications back to the conversation outside of the
/// turn that triggered them. The chat platform's own addressing data lives
/// in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationRef {
    /// Conversation identifier; one session exists per conversation.
    pub conversation_id: String,

    /// User the agent connection is opened for.
    pub user_id: String,

    /// Arbitrary platform metadata (service url, tenant, bot identity, ...).
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ConversationRef {
    /// Create a reference with no metadata.
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            metadata: HashMap::new(),
        }
    }

    /// Get a metadata value by key.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Set a metadata value.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}
