//! Socket lifecycle events delivered to subscribers.

use serde::{Deserialize, Serialize};

use crate::AgentState;

/// Subscription kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Connect,
    Receive,
    Disconnect,
}

/// Event emitted by an agent connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The socket opened.
    Connected,
    /// A raw text frame arrived.
    Received(String),
    /// Last known agent state recovered from the buffered message replay.
    Resync(AgentState),
    /// The socket closed.
    Disconnected { reason: Option<String> },
}

impl ConnectionEvent {
    /// Subscription kind this event is delivered to.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connect,
            Self::Received(_) | Self::Resync(_) => EventKind::Receive,
            Self::Disconnected { .. } => EventKind::Disconnect,
        }
    }
}

/// Subscriber for connection events.
///
/// Handlers run synchronously on the connection's delivery task, in
/// registration order, so they must not block.
pub trait EventHandler: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &ConnectionEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&ConnectionEvent) + Send + Sync,
{
    fn on_event(&self, event: &ConnectionEvent) {
        self(event);
    }
}
