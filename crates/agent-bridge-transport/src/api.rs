//! HTTP client for the agent server's auth and message replay endpoints.

use agent_bridge_core::{Credential, CredentialError, Message};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::auth::TokenSource;

/// API error.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid server url: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    messages: Vec<BufferedMessage>,
}

#[derive(Debug, Deserialize)]
struct BufferedMessage {
    payload: Value,
}

/// Source of messages the agent buffered for this user.
#[async_trait]
pub trait MessageReplay: Send + Sync {
    /// Fetch buffered messages, oldest first. Payloads that do not decode
    /// are skipped.
    async fn fetch_messages(&self, credential: &Credential) -> Result<Vec<Message>, ApiError>;
}

/// Client for the agent server's HTTP API.
#[derive(Debug, Clone)]
pub struct AgentApi {
    http: reqwest::Client,
    base: Url,
}

impl AgentApi {
    /// Create a client for the server at `base_url` (e.g. `http://localhost:3001`).
    ///
    /// # Errors
    /// Returns error if the url does not parse or is not http(s).
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "unsupported scheme: {}",
                base.scheme()
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
        })
    }

    /// Server base url.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    /// Socket url for a user: `ws://<host>/ws?token=<credential>&uid=<user id>`.
    ///
    /// The user id is omitted when empty.
    ///
    /// # Errors
    /// Returns error if the base url cannot carry a websocket scheme.
    pub fn socket_url(&self, credential: &Credential, user_id: &str) -> Result<Url, ApiError> {
        let mut url = self.endpoint("ws")?;
        let scheme = if self.base.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| ApiError::InvalidUrl(format!("cannot use scheme {scheme}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", credential.as_str());
            if !user_id.is_empty() {
                query.append_pair("uid", user_id);
            }
        }
        Ok(url)
    }

    /// Mint a token for a user, authenticating with `bearer`.
    ///
    /// Returns `None` when the server answers without a token.
    ///
    /// # Errors
    /// Returns error on transport failure or a non-200 status.
    pub async fn mint_token(&self, user_id: &str, bearer: &str) -> Result<Option<String>, ApiError> {
        let mut request = self.http.get(self.endpoint("api/auth")?).bearer_auth(bearer);
        if !user_id.is_empty() {
            request = request.query(&[("uid", user_id)]);
        }
        let response = request.send().await?;
        if response.status() != StatusCode::OK {
            return Err(ApiError::Status {
                endpoint: "/api/auth",
                status: response.status(),
            });
        }
        let body: AuthResponse = response.json().await?;
        Ok(body.token.filter(|t| !t.is_empty()))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl MessageReplay for AgentApi {
    async fn fetch_messages(&self, credential: &Credential) -> Result<Vec<Message>, ApiError> {
        let response = self
            .http
            .get(self.endpoint("api/messages")?)
            .bearer_auth(credential.as_str())
            .send()
            .await?;
        if response.status() != StatusCode::OK {
            return Err(ApiError::Status {
                endpoint: "/api/messages",
                status: response.status(),
            });
        }
        let body: MessagesResponse = response.json().await?;
        Ok(body
            .messages
            .into_iter()
            .filter_map(|m| match Message::from_value(m.payload) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping undecodable replayed message");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl TokenSource for AgentApi {
    async fn fetch_token(
        &self,
        user_id: &str,
        stale: Option<&str>,
    ) -> Result<Option<String>, CredentialError> {
        self.mint_token(user_id, stale.unwrap_or("."))
            .await
            .map_err(|e| CredentialError::Fetch(e.to_string()))
    }
}
