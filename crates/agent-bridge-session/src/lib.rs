//! Agent sessions bound to conversations.
//!
//! Provides:
//! - `SessionStateMachine` - Turn routing and agent lifecycle, free of I/O
//! - `Session` - Actor serializing turns and socket events for one conversation
//! - `SessionRegistry` - Conversation to session map with idle eviction
//! - `BridgeConfig` - Configuration with environment overlay

pub mod config;
pub mod machine;
pub mod present;
pub mod registry;
pub mod session;
pub mod storage;

pub use config::{BridgeConfig, ConfigError};
pub use machine::{Effect, SessionSnapshot, SessionStateMachine};
pub use registry::{AgentSessionFactory, SessionFactory, SessionRegistry};
pub use session::{Session, SessionError};
pub use storage::{MemorySessionStore, SessionStore};
