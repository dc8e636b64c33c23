//! In-memory session storage.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionInit, SessionStore};
use crate::session::Session;

/// In-memory session store.
///
/// Sessions live as long as the process unless evicted.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, conversation_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(conversation_id).cloned()
    }

    async fn get_or_insert_with(
        &self,
        conversation_id: &str,
        init: SessionInit<'_>,
    ) -> Arc<Session> {
        if let Some(session) = self.get(conversation_id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(init())),
        )
    }

    async fn remove(&self, conversation_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(conversation_id)
    }

    async fn remove_idle(&self, ttl: Duration) -> Vec<Arc<Session>> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.is_closed() || s.idle_for() >= ttl)
            .map(|(id, _)| id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|id| sessions.remove(id))
            .collect()
    }

    async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
