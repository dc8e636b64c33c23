//! Traits for the bridge's collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    ActionMessage, ConversationRef, Credential, CredentialError, EventHandler, EventKind,
    Notification,
};

/// Source of bearer credentials for a user.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a valid credential, reusing a cached one when it still validates.
    async fn credential(&self, user_id: &str) -> Result<Credential, CredentialError>;
}

/// Result of handing a command to an agent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The frame was queued on an open socket.
    Sent,
    /// No socket could be opened; the frame was discarded.
    Dropped,
}

/// Bidirectional channel to the agent.
///
/// Delivery is at-most-once and best-effort: there is no outbound queue, a
/// frame sent while no socket can be opened is dropped.
#[async_trait]
pub trait AgentChannel: Send + Sync {
    /// Send a command, connecting first if needed.
    async fn send(&self, action: &ActionMessage) -> SendOutcome;

    /// Subscribe to events of one kind. Handlers run in registration order.
    fn register_callback(&self, kind: EventKind, handler: Arc<dyn EventHandler>);

    /// Remove every subscriber.
    fn clear_callbacks(&self);

    /// Whether a socket exists and is open.
    fn is_connected(&self) -> bool;

    /// Close the socket, if any.
    async fn close(&self);
}

/// Delivery error.
#[derive(Debug, Error)]
#[error("Delivery failed: {0}")]
pub struct DeliveryError(pub String);

/// Side channel that posts notifications into a conversation.
///
/// Called from the session's background task, never from within a turn.
#[async_trait]
pub trait ConversationSink: Send + Sync {
    /// Deliver a notification to the referenced conversation.
    async fn deliver(
        &self,
        conversation: &ConversationRef,
        notification: Notification,
    ) -> Result<(), DeliveryError>;
}
