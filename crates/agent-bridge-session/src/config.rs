//! Bridge configuration.

use std::{env, str::FromStr, time::Duration};

use agent_bridge_core::AgentSettings;
use agent_bridge_transport::ConnectionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Agent server url.
pub const URL_ENV_VAR: &str = "AGENT_BRIDGE_URL";
/// Socket handshake timeout in seconds.
pub const CONNECT_TIMEOUT_ENV_VAR: &str = "AGENT_BRIDGE_CONNECT_TIMEOUT_SECS";
/// Connection attempts before giving up.
pub const MAX_ATTEMPTS_ENV_VAR: &str = "AGENT_BRIDGE_MAX_ATTEMPTS";
pub const LLM_MODEL_ENV_VAR: &str = "AGENT_BRIDGE_LLM_MODEL";
pub const AGENT_ENV_VAR: &str = "AGENT_BRIDGE_AGENT";
pub const LANGUAGE_ENV_VAR: &str = "AGENT_BRIDGE_LANGUAGE";
/// Idle time in seconds before a session is evicted.
pub const SESSION_TTL_ENV_VAR: &str = "AGENT_BRIDGE_SESSION_TTL_SECS";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Agent server base url.
    pub server_url: String,
    pub connection: ConnectionConfig,
    /// Settings sent with the initialize command.
    pub agent: AgentSettings,
    /// Evict sessions idle for this long (seconds). `None` keeps them forever.
    pub session_ttl_secs: Option<u64>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3001".to_string(),
            connection: ConnectionConfig::default(),
            agent: AgentSettings::default(),
            session_ttl_secs: None,
        }
    }
}

impl BridgeConfig {
    /// Defaults overlaid with the `AGENT_BRIDGE_*` environment variables.
    ///
    /// # Errors
    /// Returns error if a numeric variable does not parse or is zero where
    /// zero is meaningless.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().overlay(|key| env::var(key).ok())
    }

    /// Overlay values from `lookup`, keyed by environment variable name.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    /// Returns error if a numeric value does not parse.
    pub fn overlay<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(URL_ENV_VAR) {
            self.server_url = url;
        }
        if let Some(secs) = parse::<u64>(CONNECT_TIMEOUT_ENV_VAR, get(CONNECT_TIMEOUT_ENV_VAR))? {
            self.connection.connect_timeout_secs = secs;
        }
        if let Some(attempts) = parse::<u32>(MAX_ATTEMPTS_ENV_VAR, get(MAX_ATTEMPTS_ENV_VAR))? {
            if attempts == 0 {
                return Err(ConfigError::Invalid {
                    key: MAX_ATTEMPTS_ENV_VAR,
                    value: attempts.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            self.connection.retry.max_attempts = attempts;
        }
        if let Some(model) = get(LLM_MODEL_ENV_VAR) {
            self.agent.llm_model = model;
        }
        if let Some(agent) = get(AGENT_ENV_VAR) {
            self.agent.agent = agent;
        }
        if let Some(language) = get(LANGUAGE_ENV_VAR) {
            self.agent.language = language;
        }
        if let Some(ttl) = parse::<u64>(SESSION_TTL_ENV_VAR, get(SESSION_TTL_ENV_VAR))? {
            self.session_ttl_secs = Some(ttl);
        }
        Ok(self)
    }

    /// Idle session TTL, if eviction is enabled.
    #[must_use]
    pub fn session_ttl(&self) -> Option<Duration> {
        self.session_ttl_secs.map(Duration::from_secs)
    }
}

fn parse<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}
