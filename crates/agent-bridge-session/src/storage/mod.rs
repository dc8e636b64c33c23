//! Session storage.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::session::Session;

pub mod memory;

pub use memory::MemorySessionStore;

/// Constructor invoked by [`SessionStore::get_or_insert_with`] on a miss.
pub type SessionInit<'a> = Box<dyn FnOnce() -> Session + Send + 'a>;

/// Map from conversation id to live session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Get the session for a conversation.
    async fn get(&self, conversation_id: &str) -> Option<Arc<Session>>;

    /// Get the session for a conversation, creating it on a miss.
    ///
    /// Check and insert are atomic: concurrent callers for the same id
    /// receive the same session and `init` runs at most once.
    async fn get_or_insert_with(
        &self,
        conversation_id: &str,
        init: SessionInit<'_>,
    ) -> Arc<Session>;

    /// Remove a session. The caller is responsible for closing it.
    async fn remove(&self, conversation_id: &str) -> Option<Arc<Session>>;

    /// Remove every session idle for at least `ttl`, or already closed.
    async fn remove_idle(&self, ttl: Duration) -> Vec<Arc<Session>>;

    /// Number of stored sessions.
    async fn count(&self) -> usize;
}
