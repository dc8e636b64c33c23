//! Transport layer between the bridge and the agent server.
//!
//! Provides:
//! - `ConnectionManager` - One socket per session with bounded retry
//! - `CallbackRegistry` - Ordered event subscribers
//! - `AgentApi` - HTTP client for credential minting and message replay
//! - `CachedCredentialProvider` - Validated token cache

pub mod api;
pub mod auth;
pub mod callbacks;
pub mod connection;
pub mod retry;

pub use api::{AgentApi, ApiError, MessageReplay};
pub use auth::{CachedCredentialProvider, MemoryTokenStore, TokenSource, TokenStore};
pub use callbacks::CallbackRegistry;
pub use connection::{ConnectionConfig, ConnectionError, ConnectionManager};
pub use retry::RetryPolicy;
