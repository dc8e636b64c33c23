//! Presentation requests handed to the conversation renderer.

use serde::{Deserialize, Serialize};

/// Visual hint for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hint {
    /// Task finished.
    Success,
    /// The agent expects a reply.
    Question,
    /// Agent narration that needs no reply.
    Idea,
    /// A file was written.
    File,
    Note,
}

/// A message to surface in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub text: String,
    pub hint: Hint,
    #[serde(default)]
    pub important: bool,
}

impl Notification {
    /// Create a regular notification.
    #[must_use]
    pub fn new(text: impl Into<String>, hint: Hint) -> Self {
        Self {
            text: text.into(),
            hint,
            important: false,
        }
    }

    /// Mark as important.
    #[must_use]
    pub const fn important(mut self) -> Self {
        self.important = true;
        self
    }
}
