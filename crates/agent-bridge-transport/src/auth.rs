//! Credential acquisition with a validated token cache.

use std::{collections::HashMap, sync::RwLock};

use agent_bridge_core::{Credential, CredentialError, CredentialProvider};
use async_trait::async_trait;

/// Issuer of fresh tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Fetch a new token for `user_id`, authenticating with the stale token if any.
    ///
    /// Returns `None` when the issuer answered without a token.
    async fn fetch_token(
        &self,
        user_id: &str,
        stale: Option<&str>,
    ) -> Result<Option<String>, CredentialError>;
}

/// Per-user token cache.
pub trait TokenStore: Send + Sync {
    /// Load the cached token for a user.
    fn load(&self, user_id: &str) -> Result<Option<String>, CredentialError>;

    /// Save a token for a user, replacing any previous one.
    fn save(&self, user_id: &str, token: &str) -> Result<(), CredentialError>;
}

/// In-memory token store.
///
/// Tokens are lost on restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl MemoryTokenStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self, user_id: &str) -> Result<Option<String>, CredentialError> {
        Ok(self
            .tokens
            .read()
            .map_err(|e| CredentialError::Store(e.to_string()))?
            .get(user_id)
            .cloned())
    }

    fn save(&self, user_id: &str, token: &str) -> Result<(), CredentialError> {
        self.tokens
            .write()
            .map_err(|e| CredentialError::Store(e.to_string()))?
            .insert(user_id.to_string(), token.to_string());
        Ok(())
    }
}

/// Credential provider that reuses a cached token while it validates and
/// otherwise mints a new one.
pub struct CachedCredentialProvider<S, T>
where
    S: TokenStore,
    T: TokenSource,
{
    store: S,
    source: T,
}

impl<S, T> CachedCredentialProvider<S, T>
where
    S: TokenStore,
    T: TokenSource,
{
    /// Create a provider over a store and a token source.
    #[must_use]
    pub const fn new(store: S, source: T) -> Self {
        Self { store, source }
    }
}

#[async_trait]
impl<S, T> CredentialProvider for CachedCredentialProvider<S, T>
where
    S: TokenStore,
    T: TokenSource,
{
    async fn credential(&self, user_id: &str) -> Result<Credential, CredentialError> {
        let cached = self.store.load(user_id)?;
        if let Some(token) = cached.as_deref() {
            if let Ok(credential) = Credential::parse(token) {
                tracing::debug!(user_id, "Reusing cached credential");
                return Ok(credential);
            }
        }

        let stale = cached.as_deref().filter(|t| !t.is_empty());
        let fresh = self
            .source
            .fetch_token(user_id, stale)
            .await?
            .ok_or_else(|| CredentialError::Fetch("issuer returned no token".to_string()))?;

        let credential = Credential::parse(fresh)?;
        self.store.save(user_id, credential.as_str())?;
        tracing::info!(user_id, "Fetched new credential");
        Ok(credential)
    }
}
