//! Core abstractions for bridging a conversation to a remote agent.
//!
//! This crate provides the vocabulary shared by the transport and session layers:
//! - `AgentState` - Agent lifecycle states and the terminal set
//! - `Message` - Action/Observation wire messages and their codec
//! - `CommandBuilder` - Outbound command constructors
//! - `Credential` - Bearer token with structural claim validation
//! - `ConnectionEvent` - Typed socket lifecycle events
//! - Collaborator traits (`CredentialProvider`, `AgentChannel`, `ConversationSink`)

pub mod command;
pub mod conversation;
pub mod credential;
pub mod event;
pub mod notification;
pub mod protocol;
pub mod state;
pub mod traits;

pub use command::{AgentSettings, CommandBuilder};
pub use conversation::ConversationRef;
pub use credential::{Credential, CredentialError};
pub use event::{ConnectionEvent, EventHandler, EventKind};
pub use notification::{Hint, Notification};
pub use protocol::{ActionMessage, ActionType, Message, ObservationMessage, ObservationType, ProtocolError};
pub use state::{AgentState, UnknownAgentState};
pub use traits::{AgentChannel, ConversationSink, CredentialProvider, DeliveryError, SendOutcome};
