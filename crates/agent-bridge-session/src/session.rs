//! Session actor.
//!
//! A session owns one [`SessionStateMachine`] and one agent channel. User turns
//! and connection events are processed by a single task through one ordered
//! queue, so the machine is never touched concurrently.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};

use agent_bridge_core::{
    AgentChannel, CommandBuilder, ConnectionEvent, ConversationRef, ConversationSink,
    EventHandler, EventKind, Hint, Message, Notification, SendOutcome,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;

use crate::machine::{Effect, REPLY_UNREACHABLE, SessionSnapshot, SessionStateMachine};

/// Session error.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
}

enum Command {
    Turn {
        text: String,
        reply: oneshot::Sender<Vec<String>>,
    },
    Event(ConnectionEvent),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Close(oneshot::Sender<()>),
}

/// Feeds connection events into the session queue.
///
/// Holds a weak sender so the channel's subscriber list does not keep the
/// actor alive.
struct Forwarder {
    inbox: mpsc::WeakUnboundedSender<Command>,
}

impl EventHandler for Forwarder {
    fn on_event(&self, event: &ConnectionEvent) {
        if let Some(inbox) = self.inbox.upgrade() {
            let _ = inbox.send(Command::Event(event.clone()));
        }
    }
}

/// Handle to a running session.
pub struct Session {
    conversation: ConversationRef,
    inbox: mpsc::UnboundedSender<Command>,
    last_active: Arc<Mutex<Instant>>,
}

impl Session {
    /// Start a session for a conversation. Must be called within a tokio runtime.
    pub fn spawn(
        conversation: ConversationRef,
        channel: Arc<dyn AgentChannel>,
        sink: Arc<dyn ConversationSink>,
        commands: CommandBuilder,
    ) -> Self {
        let (inbox, queue) = mpsc::unbounded_channel();
        let forwarder: Arc<dyn EventHandler> = Arc::new(Forwarder {
            inbox: inbox.downgrade(),
        });
        for kind in [EventKind::Connect, EventKind::Receive, EventKind::Disconnect] {
            channel.register_callback(kind, Arc::clone(&forwarder));
        }

        let last_active = Arc::new(Mutex::new(Instant::now()));
        let span = tracing::info_span!(
            "session",
            conversation_id = %conversation.conversation_id,
            user_id = %conversation.user_id,
        );
        let actor = SessionActor {
            conversation: conversation.clone(),
            machine: SessionStateMachine::new(commands),
            channel,
            sink,
            last_active: Arc::clone(&last_active),
        };
        tokio::spawn(actor.run(queue).instrument(span));

        Self {
            conversation,
            inbox,
            last_active,
        }
    }

    #[must_use]
    pub const fn conversation(&self) -> &ConversationRef {
        &self.conversation
    }

    /// Handle one user turn and return the direct replies.
    ///
    /// # Errors
    /// Returns error if the session has been closed.
    pub async fn handle_turn(&self, text: &str) -> Result<Vec<String>, SessionError> {
        let (reply, replies) = oneshot::channel();
        self.inbox
            .send(Command::Turn {
                text: text.to_string(),
                reply,
            })
            .map_err(|_| SessionError::Closed)?;
        replies.await.map_err(|_| SessionError::Closed)
    }

    /// Current state, after every previously queued input has been handled.
    ///
    /// # Errors
    /// Returns error if the session has been closed.
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, snapshot) = oneshot::channel();
        self.inbox
            .send(Command::Snapshot(reply))
            .map_err(|_| SessionError::Closed)?;
        snapshot.await.map_err(|_| SessionError::Closed)
    }

    /// Stop the actor and close the agent channel. Idempotent.
    pub async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.inbox.send(Command::Close(done)).is_ok() {
            let _ = closed.await;
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Time since the last turn or connection event.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

struct SessionActor {
    conversation: ConversationRef,
    machine: SessionStateMachine,
    channel: Arc<dyn AgentChannel>,
    sink: Arc<dyn ConversationSink>,
    last_active: Arc<Mutex<Instant>>,
}

impl SessionActor {
    async fn run(mut self, mut queue: mpsc::UnboundedReceiver<Command>) {
        tracing::debug!("Session started");
        let mut closed = None;

        while let Some(command) = queue.recv().await {
            *self
                .last_active
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Instant::now();

            match command {
                Command::Turn { text, reply } => {
                    let replies = self.on_turn(&text).await;
                    let _ = reply.send(replies);
                }
                Command::Event(event) => self.on_event(event).await,
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.machine.snapshot());
                }
                Command::Close(done) => {
                    closed = Some(done);
                    break;
                }
            }
        }

        queue.close();
        self.channel.clear_callbacks();
        self.channel.close().await;
        if let Some(done) = closed {
            let _ = done.send(());
        }
        tracing::info!("Session closed");
    }

    async fn on_turn(&mut self, text: &str) -> Vec<String> {
        let mut replies = Vec::new();
        let mut dropped = false;

        for effect in self.machine.handle_turn(text) {
            match effect {
                Effect::Send(action) => {
                    if self.channel.send(&action).await == SendOutcome::Dropped {
                        dropped = true;
                        break;
                    }
                }
                Effect::Reply(reply) => replies.push(reply),
                Effect::Notify(notification) => self.deliver(notification).await,
            }
        }

        if dropped {
            self.machine.command_dropped();
            return vec![REPLY_UNREACHABLE.to_string()];
        }
        replies
    }

    async fn on_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => tracing::debug!("Agent connected"),
            ConnectionEvent::Received(frame) => match Message::decode(&frame) {
                Ok(message) => {
                    for effect in self.machine.handle_event(&message) {
                        self.apply(effect).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(frame = e.frame().unwrap_or(frame.as_str()), "Ignoring undecodable frame: {e}");
                }
            },
            ConnectionEvent::Resync(state) => self.machine.resync(state),
            ConnectionEvent::Disconnected { reason } => {
                tracing::info!(reason = reason.as_deref().unwrap_or("none"), "Agent disconnected");
                self.machine.connection_lost();
            }
        }
    }

    async fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Send(action) => {
                if self.channel.send(&action).await == SendOutcome::Dropped {
                    self.machine.command_dropped();
                    self.deliver(Notification::new(REPLY_UNREACHABLE, Hint::Note))
                        .await;
                }
            }
            Effect::Reply(text) => self.deliver(Notification::new(text, Hint::Note)).await,
            Effect::Notify(notification) => self.deliver(notification).await,
        }
    }

    async fn deliver(&self, notification: Notification) {
        if let Err(e) = self.sink.deliver(&self.conversation, notification).await {
            tracing::error!("Failed to deliver notification: {e}");
        }
    }
}
