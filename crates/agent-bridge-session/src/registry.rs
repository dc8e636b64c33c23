//! Process-wide map from conversation to session.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use agent_bridge_core::{
    AgentSettings, CommandBuilder, ConversationRef, ConversationSink, CredentialProvider,
};
use agent_bridge_transport::{
    AgentApi, ApiError, CachedCredentialProvider, ConnectionConfig, ConnectionManager,
    MemoryTokenStore,
};
use tokio::task::JoinHandle;

use crate::{
    config::BridgeConfig,
    session::{Session, SessionError},
    storage::SessionStore,
};

/// Builds the session for a conversation seen for the first time.
pub trait SessionFactory: Send + Sync {
    /// Spawn a session. Called within a tokio runtime.
    fn create(&self, conversation: &ConversationRef) -> Session;
}

/// Factory wiring each session to its own socket on the agent server.
pub struct AgentSessionFactory {
    api: AgentApi,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn ConversationSink>,
    connection: ConnectionConfig,
    agent: AgentSettings,
}

impl AgentSessionFactory {
    /// Create a factory for the configured server, caching credentials in memory.
    ///
    /// # Errors
    /// Returns error if the server url is invalid.
    pub fn new(config: &BridgeConfig, sink: Arc<dyn ConversationSink>) -> Result<Self, ApiError> {
        let api = AgentApi::new(&config.server_url)?;
        let credentials = Arc::new(CachedCredentialProvider::new(
            MemoryTokenStore::new(),
            api.clone(),
        ));
        Ok(Self::with_credentials(config, api, credentials, sink))
    }

    /// Create a factory with an explicit credential provider.
    #[must_use]
    pub fn with_credentials(
        config: &BridgeConfig,
        api: AgentApi,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn ConversationSink>,
    ) -> Self {
        Self {
            api,
            credentials,
            sink,
            connection: config.connection.clone(),
            agent: config.agent.clone(),
        }
    }
}

impl SessionFactory for AgentSessionFactory {
    fn create(&self, conversation: &ConversationRef) -> Session {
        tracing::info!(
            conversation_id = %conversation.conversation_id,
            user_id = %conversation.user_id,
            "Creating session"
        );
        let manager = ConnectionManager::new(
            conversation.user_id.clone(),
            self.api.clone(),
            Arc::clone(&self.credentials),
            self.connection.clone(),
        )
        .with_replay(Arc::new(self.api.clone()));

        Session::spawn(
            conversation.clone(),
            Arc::new(manager),
            Arc::clone(&self.sink),
            CommandBuilder::new(self.agent.clone()),
        )
    }
}

/// Routes user turns to per-conversation sessions, creating them on demand.
pub struct SessionRegistry<S, F>
where
    S: SessionStore,
    F: SessionFactory,
{
    store: S,
    factory: F,
    ttl: Option<Duration>,
}

impl<S, F> SessionRegistry<S, F>
where
    S: SessionStore,
    F: SessionFactory,
{
    /// Create a registry without idle eviction.
    #[must_use]
    pub const fn new(store: S, factory: F) -> Self {
        Self {
            store,
            factory,
            ttl: None,
        }
    }

    /// Evict sessions idle for `ttl` on each sweep.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Session for a conversation, created on first use.
    pub async fn session(&self, conversation: &ConversationRef) -> Arc<Session> {
        self.store
            .get_or_insert_with(
                &conversation.conversation_id,
                Box::new(|| self.factory.create(conversation)),
            )
            .await
    }

    /// Handle a user turn and return the direct replies.
    ///
    /// A session found closed is replaced once.
    ///
    /// # Errors
    /// Returns error if the replacement session is closed as well.
    pub async fn handle_turn(
        &self,
        conversation: &ConversationRef,
        text: &str,
    ) -> Result<Vec<String>, SessionError> {
        match self.session(conversation).await.handle_turn(text).await {
            Err(SessionError::Closed) => {
                tracing::debug!(conversation_id = %conversation.conversation_id, "Replacing closed session");
                self.store.remove(&conversation.conversation_id).await;
                self.session(conversation).await.handle_turn(text).await
            }
            result => result,
        }
    }

    /// Close and forget a conversation's session.
    pub async fn evict(&self, conversation_id: &str) -> bool {
        let Some(session) = self.store.remove(conversation_id).await else {
            return false;
        };
        session.close().await;
        tracing::info!(conversation_id, "Evicted session");
        true
    }

    /// Close sessions idle past the TTL. Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        close_sessions(self.store.remove_idle(ttl).await).await
    }

    /// Close every session.
    pub async fn shutdown(&self) -> usize {
        close_sessions(self.store.remove_idle(Duration::ZERO).await).await
    }

    pub async fn session_count(&self) -> usize {
        self.store.count().await
    }
}

async fn close_sessions(sessions: Vec<Arc<Session>>) -> usize {
    for session in &sessions {
        session.close().await;
        tracing::info!(
            conversation_id = %session.conversation().conversation_id,
            "Closed session"
        );
    }
    sessions.len()
}

impl<S, F> SessionRegistry<S, F>
where
    S: SessionStore + 'static,
    F: SessionFactory + 'static,
{
    /// Periodically evict idle sessions until the registry is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    tracing::debug!(evicted, "Idle sweep finished");
                }
            }
        })
    }
}
