//! Socket connection manager for one agent session.
//!
//! The manager owns at most one socket. Connecting fetches a credential, opens
//! the socket and spawns an I/O task that writes outbound frames and fans
//! inbound events out to the registered callbacks. Setup failures are retried
//! under a [`RetryPolicy`] and end in an explicit error.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use agent_bridge_core::{
    ActionMessage, AgentChannel, AgentState, ConnectionEvent, Credential, CredentialError,
    CredentialProvider, EventHandler, EventKind, Message, SendOutcome,
};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{self, Message as WsMessage},
};
use uuid::Uuid;

use crate::{
    api::{AgentApi, ApiError, MessageReplay},
    callbacks::CallbackRegistry,
    retry::RetryPolicy,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection error.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("Authentication failed: credential has no session claim")]
    AuthenticationFailed,
    #[error("Credential error: {0}")]
    Credential(CredentialError),
    #[error("API error: {0}")]
    Api(#[from] ApiError),
    #[error("Socket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("Connection failed after {attempts} attempts: {last}")]
    Failed {
        attempts: u32,
        #[source]
        last: Box<ConnectionError>,
    },
}

impl ConnectionError {
    const fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::AuthenticationFailed | Self::Api(ApiError::InvalidUrl(_)) | Self::Failed { .. }
        )
    }
}

impl From<CredentialError> for ConnectionError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::Invalid => Self::AuthenticationFailed,
            other => Self::Credential(other),
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// How long to wait for the socket handshake (seconds).
    pub connect_timeout_secs: u64,
    /// Retry policy for connection setup.
    pub retry: RetryPolicy,
    /// Recover the last agent state from the buffered message replay on open.
    pub replay_on_connect: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 60,
            retry: RetryPolicy::default(),
            replay_on_connect: true,
        }
    }
}

impl ConnectionConfig {
    /// Handshake timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

struct Link {
    id: Uuid,
    outbound: mpsc::UnboundedSender<String>,
    task: JoinHandle<()>,
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Manages the socket to the agent for one user.
pub struct ConnectionManager {
    user_id: String,
    api: AgentApi,
    credentials: Arc<dyn CredentialProvider>,
    replay: Option<Arc<dyn MessageReplay>>,
    config: ConnectionConfig,
    callbacks: Arc<CallbackRegistry>,
    link: Mutex<Option<Link>>,
    /// Generation of the open socket, 0 when none is open.
    live: Arc<AtomicU64>,
}

impl ConnectionManager {
    /// Create a manager. No connection is attempted until [`Self::connect`]
    /// or the first send.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        api: AgentApi,
        credentials: Arc<dyn CredentialProvider>,
        config: ConnectionConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            api,
            credentials,
            replay: None,
            config,
            callbacks: Arc::new(CallbackRegistry::new()),
            link: Mutex::new(None),
            live: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use a replay source to resynchronize the agent state on open.
    #[must_use]
    pub fn with_replay(mut self, replay: Arc<dyn MessageReplay>) -> Self {
        self.replay = Some(replay);
        self
    }

    /// User this manager connects for.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Open the socket, retrying setup failures under the configured policy.
    ///
    /// Concurrent callers wait for the same attempt. Returns immediately if
    /// a socket is already open. Dropping the future cancels the attempt.
    ///
    /// # Errors
    /// Returns [`ConnectionError::AuthenticationFailed`] without retrying if
    /// the credential is structurally invalid, and [`ConnectionError::Failed`]
    /// once the attempts or the deadline are exhausted.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        let mut link = self.link.lock().await;
        if self.is_open() {
            return Ok(());
        }
        if let Some(stale) = link.take() {
            stale.task.abort();
        }

        let policy = &self.config.retry;
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.open(attempt).await {
                Ok(new_link) => {
                    *link = Some(new_link);
                    return Ok(());
                }
                Err(e) if !e.is_retryable() => {
                    tracing::error!(user_id = %self.user_id, attempt, error = %e, "Connection failed");
                    return Err(e);
                }
                Err(e) => {
                    let out_of_time = policy
                        .deadline()
                        .is_some_and(|deadline| started.elapsed() >= deadline);
                    if !policy.allows_retry(attempt) || out_of_time {
                        tracing::error!(user_id = %self.user_id, attempt, error = %e, "Giving up on connection");
                        return Err(ConnectionError::Failed {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        user_id = %self.user_id,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn open(&self, attempt: u32) -> Result<Link, ConnectionError> {
        let credential = self.credentials.credential(&self.user_id).await?;
        let url = self.api.socket_url(&credential, &self.user_id)?;

        let timeout = self.config.connect_timeout();
        let (socket, _) = tokio::time::timeout(timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| ConnectionError::Timeout(timeout))??;

        let id = Uuid::new_v4();
        let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
        self.live.store(generation, Ordering::SeqCst);
        tracing::info!(user_id = %self.user_id, connection_id = %id, attempt, "Socket connected");

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let replay = self
            .config
            .replay_on_connect
            .then(|| self.replay.clone().map(|r| (r, credential)))
            .flatten();
        let task = tokio::spawn(run_link(
            id,
            generation,
            socket,
            outbound_rx,
            Arc::clone(&self.callbacks),
            Arc::clone(&self.live),
            replay,
        ));

        Ok(Link { id, outbound, task })
    }

    fn is_open(&self) -> bool {
        self.live.load(Ordering::SeqCst) != 0
    }
}

#[async_trait]
impl AgentChannel for ConnectionManager {
    async fn send(&self, action: &ActionMessage) -> SendOutcome {
        let frame = match serde_json::to_string(action) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!(action = %action.action, "Failed to serialize command: {e}");
                return SendOutcome::Dropped;
            }
        };

        if !self.is_open() {
            if let Err(e) = self.connect().await {
                tracing::warn!(user_id = %self.user_id, action = %action.action, error = %e, "Dropping command, agent unreachable");
                return SendOutcome::Dropped;
            }
        }

        let link = self.link.lock().await;
        match link.as_ref() {
            Some(link) if self.is_open() && link.outbound.send(frame).is_ok() => {
                tracing::debug!(connection_id = %link.id, action = %action.action, "Sent command");
                SendOutcome::Sent
            }
            _ => {
                tracing::warn!(user_id = %self.user_id, action = %action.action, "Dropping command, socket closed");
                SendOutcome::Dropped
            }
        }
    }

    fn register_callback(&self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.callbacks.register(kind, handler);
    }

    fn clear_callbacks(&self) {
        self.callbacks.clear();
    }

    fn is_connected(&self) -> bool {
        self.is_open()
    }

    async fn close(&self) {
        if let Some(link) = self.link.lock().await.take() {
            tracing::info!(user_id = %self.user_id, connection_id = %link.id, "Closing socket");
            // Dropping the sender makes the I/O task send a close frame and exit.
            drop(link.outbound);
        }
    }
}

async fn run_link(
    id: Uuid,
    generation: u64,
    socket: Socket,
    mut outbound: mpsc::UnboundedReceiver<String>,
    callbacks: Arc<CallbackRegistry>,
    live: Arc<AtomicU64>,
    replay: Option<(Arc<dyn MessageReplay>, Credential)>,
) {
    callbacks.dispatch(&ConnectionEvent::Connected);

    if let Some((replay, credential)) = replay {
        if let Some(state) = resync_state(replay.as_ref(), &credential, id).await {
            callbacks.dispatch(&ConnectionEvent::Resync(state));
        }
    }

    let (mut sink, mut stream) = socket.split();
    let reason = loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
                        tracing::error!(connection_id = %id, "WebSocket send error: {e}");
                        break Some(e.to_string());
                    }
                }
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break Some("closed locally".to_string());
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(WsMessage::Text(text))) => {
                    callbacks.dispatch(&ConnectionEvent::Received(text.as_str().to_owned()));
                }
                Some(Ok(WsMessage::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => callbacks.dispatch(&ConnectionEvent::Received(text)),
                    Err(_) => tracing::warn!(connection_id = %id, "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_owned());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(connection_id = %id, "WebSocket error: {e}");
                    break Some(e.to_string());
                }
                None => break None,
            },
        }
    };

    let _ = live.compare_exchange(generation, 0, Ordering::SeqCst, Ordering::SeqCst);
    tracing::info!(connection_id = %id, reason = reason.as_deref().unwrap_or(""), "Socket closed");
    callbacks.dispatch(&ConnectionEvent::Disconnected { reason });
}

/// Last `agent_state_changed` state in the buffered messages, if any.
async fn resync_state(
    replay: &dyn MessageReplay,
    credential: &Credential,
    id: Uuid,
) -> Option<AgentState> {
    match replay.fetch_messages(credential).await {
        Ok(messages) => messages.iter().rev().find_map(|m| match m {
            Message::Observation(obs) => obs.agent_state(),
            Message::Action(_) => None,
        }),
        Err(e) => {
            tracing::warn!(connection_id = %id, "Message replay failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use agent_bridge_core::CommandBuilder;
    use axum::{
        Json, Router,
        extract::{
            Query, State, WebSocketUpgrade,
            ws::{Message as AxumMessage, WebSocket},
        },
        response::IntoResponse,
        routing::get,
    };
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use tokio::sync::broadcast;
    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn token(sid: &str) -> String {
        encode(&Header::default(), &json!({"sid": sid}), &EncodingKey::from_secret(b"k")).unwrap()
    }

    struct StaticCredentials {
        result: Result<String, CredentialError>,
        calls: AtomicUsize,
    }

    impl StaticCredentials {
        fn valid() -> Arc<Self> {
            Arc::new(Self {
                result: Ok(token("sid-1")),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(e: CredentialError) -> Arc<Self> {
            Arc::new(Self {
                result: Err(e),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CredentialProvider for StaticCredentials {
        async fn credential(&self, _user_id: &str) -> Result<Credential, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone().and_then(|t| Credential::parse(t))
        }
    }

    struct MockState {
        frames: mpsc::UnboundedSender<String>,
        push: broadcast::Sender<String>,
        queries: StdMutex<Vec<HashMap<String, String>>>,
        replay: Value,
    }

    struct MockAgent {
        url: String,
        frames: mpsc::UnboundedReceiver<String>,
        push: broadcast::Sender<String>,
        state: Arc<MockState>,
    }

    impl MockAgent {
        async fn start(replay: Value) -> Self {
            let (frames_tx, frames) = mpsc::unbounded_channel();
            let (push, _) = broadcast::channel(64);
            let state = Arc::new(MockState {
                frames: frames_tx,
                push: push.clone(),
                queries: StdMutex::new(Vec::new()),
                replay,
            });
            let app = Router::new()
                .route("/ws", get(ws_handler))
                .route(
                    "/api/messages",
                    get(|State(state): State<Arc<MockState>>| async move {
                        Json(state.replay.clone())
                    }),
                )
                .with_state(Arc::clone(&state));
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });
            Self {
                url: format!("http://{addr}"),
                frames,
                push,
                state,
            }
        }

        fn connections(&self) -> usize {
            self.state.queries.lock().unwrap().len()
        }

        async fn next_frame(&mut self) -> Value {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.frames.recv())
                .await
                .unwrap()
                .unwrap();
            serde_json::from_str(&frame).unwrap()
        }
    }

    async fn ws_handler(
        ws: WebSocketUpgrade,
        Query(query): Query<HashMap<String, String>>,
        State(state): State<Arc<MockState>>,
    ) -> impl IntoResponse {
        state.queries.lock().unwrap().push(query);
        ws.on_upgrade(move |socket| mock_socket(socket, state))
    }

    async fn mock_socket(mut socket: WebSocket, state: Arc<MockState>) {
        let mut push = state.push.subscribe();
        loop {
            tokio::select! {
                pushed = push.recv() => match pushed {
                    Ok(text) if text == "__close__" => {
                        let _ = socket.send(AxumMessage::Close(None)).await;
                        break;
                    }
                    Ok(text) => {
                        if socket.send(AxumMessage::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                received = socket.recv() => match received {
                    Some(Ok(AxumMessage::Text(text))) => {
                        let _ = state.frames.send(text.as_str().to_owned());
                    }
                    Some(Ok(AxumMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    fn manager(url: &str, credentials: Arc<dyn CredentialProvider>, config: ConnectionConfig) -> ConnectionManager {
        ConnectionManager::new("user-1", AgentApi::new(url).unwrap(), credentials, config)
    }

    fn fast_config() -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout_secs: 5,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay_ms: 10,
                max_delay_ms: 20,
                jitter: 0.5,
                deadline_secs: None,
            },
            replay_on_connect: false,
        }
    }

    fn event_log(manager: &ConnectionManager) -> (Arc<StdMutex<Vec<ConnectionEvent>>>, mpsc::UnboundedReceiver<()>) {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        for kind in [EventKind::Connect, EventKind::Receive, EventKind::Disconnect] {
            let log = Arc::clone(&log);
            let tick_tx = tick_tx.clone();
            manager.register_callback(
                kind,
                Arc::new(move |event: &ConnectionEvent| {
                    log.lock().unwrap().push(event.clone());
                    let _ = tick_tx.send(());
                }),
            );
        }
        (log, tick_rx)
    }

    async fn wait_for(ticks: &mut mpsc::UnboundedReceiver<()>, n: usize) {
        for _ in 0..n {
            tokio::time::timeout(Duration::from_secs(5), ticks.recv())
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_first_send_connects_and_delivers() {
        let mut agent = MockAgent::start(Value::Null).await;
        let manager = manager(&agent.url, StaticCredentials::valid(), fast_config());
        let (log, mut ticks) = event_log(&manager);
        assert!(!manager.is_connected());

        let outcome = manager.send(&CommandBuilder::default().initialize()).await;

        assert_eq!(outcome, SendOutcome::Sent);
        assert!(manager.is_connected());
        assert_eq!(agent.next_frame().await["action"], "initialize");
        wait_for(&mut ticks, 1).await;
        assert_eq!(*log.lock().unwrap(), vec![ConnectionEvent::Connected]);

        let queries = agent.state.queries.lock().unwrap().clone();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0]["uid"], "user-1");
        assert!(Credential::is_valid(&queries[0]["token"]));
    }

    #[tokio::test]
    async fn test_inbound_frames_fan_out_in_order() {
        let agent = MockAgent::start(Value::Null).await;
        let manager = manager(&agent.url, StaticCredentials::valid(), fast_config());
        let order = Arc::new(StdMutex::new(Vec::new()));
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        for name in ["first", "second"] {
            let order = Arc::clone(&order);
            let done_tx = done_tx.clone();
            manager.register_callback(
                EventKind::Receive,
                Arc::new(move |event: &ConnectionEvent| {
                    if let ConnectionEvent::Received(frame) = event {
                        order.lock().unwrap().push(format!("{name}:{frame}"));
                        let _ = done_tx.send(());
                    }
                }),
            );
        }

        assert_ok!(manager.connect().await);
        agent.push.send("a".to_string()).unwrap();
        agent.push.send("b".to_string()).unwrap();
        wait_for(&mut done_rx, 4).await;

        assert_eq!(
            *order.lock().unwrap(),
            vec!["first:a", "second:a", "first:b", "second:b"]
        );
    }

    #[tokio::test]
    async fn test_remote_close_dispatches_disconnect_and_next_send_reconnects() {
        let mut agent = MockAgent::start(Value::Null).await;
        let manager = manager(&agent.url, StaticCredentials::valid(), fast_config());
        let (log, mut ticks) = event_log(&manager);

        assert_ok!(manager.connect().await);
        wait_for(&mut ticks, 1).await;
        agent.push.send("__close__".to_string()).unwrap();
        wait_for(&mut ticks, 1).await;

        assert!(matches!(
            log.lock().unwrap().last(),
            Some(ConnectionEvent::Disconnected { .. })
        ));
        assert!(!manager.is_connected());

        let outcome = manager.send(&CommandBuilder::default().clear_messages()).await;
        assert_eq!(outcome, SendOutcome::Sent);
        assert_eq!(agent.next_frame().await["action"], "clear_messages");
        assert_eq!(agent.connections(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_agent_fails_after_bounded_attempts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let credentials = StaticCredentials::valid();
        let manager = manager(&url, credentials.clone(), fast_config());

        let err = assert_err!(manager.connect().await);
        assert!(matches!(err, ConnectionError::Failed { attempts: 2, .. }));
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 2);

        let outcome = manager.send(&CommandBuilder::default().initialize()).await;
        assert_eq!(outcome, SendOutcome::Dropped);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_invalid_credential_is_not_retried() {
        let agent = MockAgent::start(Value::Null).await;
        let credentials = StaticCredentials::failing(CredentialError::Invalid);
        let manager = manager(&agent.url, credentials.clone(), fast_config());

        let err = assert_err!(manager.connect().await);
        assert!(matches!(err, ConnectionError::AuthenticationFailed));
        assert_eq!(credentials.calls.load(Ordering::SeqCst), 1);
        assert_eq!(agent.connections(), 0);
    }

    #[tokio::test]
    async fn test_credential_fetch_failure_is_retried() {
        let agent = MockAgent::start(Value::Null).await;
        let credentials = StaticCredentials::failing(CredentialError::Fetch("down".into()));
        let manager = manager(&agent.url, credentials.clone(), fast_config());

        let err = assert_err!(manager.connect().await);
        let ConnectionError::Failed { attempts, last } = err else {
            panic!("expected a bounded failure");
        };
        assert_eq!(attempts, 2);
        assert!(matches!(*last, ConnectionError::Credential(CredentialError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        // Accepts TCP but never answers the websocket handshake.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        let config = ConnectionConfig {
            connect_timeout_secs: 0,
            retry: RetryPolicy::no_retry(),
            replay_on_connect: false,
        };
        let manager = manager(&url, StaticCredentials::valid(), config);

        let err = assert_err!(manager.connect().await);
        let ConnectionError::Failed { attempts: 1, last } = err else {
            panic!("expected a bounded failure");
        };
        assert!(matches!(*last, ConnectionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_replay_resyncs_last_agent_state() {
        let agent = MockAgent::start(json!({"messages": [
            {"payload": {"observation": "agent_state_changed", "extras": {"agent_state": "running"}}},
            {"payload": {"action": "finish", "args": {}}},
            {"payload": {"observation": "agent_state_changed", "extras": {"agent_state": "finished"}}},
            {"payload": {"observation": "run", "content": "ls", "extras": {}}}
        ]}))
        .await;
        let config = ConnectionConfig {
            replay_on_connect: true,
            ..fast_config()
        };
        let api = AgentApi::new(&agent.url).unwrap();
        let manager = manager(&agent.url, StaticCredentials::valid(), config).with_replay(Arc::new(api));
        let (log, mut ticks) = event_log(&manager);

        assert_ok!(manager.connect().await);
        wait_for(&mut ticks, 2).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                ConnectionEvent::Connected,
                ConnectionEvent::Resync(AgentState::Finished)
            ]
        );
    }

    #[tokio::test]
    async fn test_close_dispatches_disconnect() {
        let agent = MockAgent::start(Value::Null).await;
        let manager = manager(&agent.url, StaticCredentials::valid(), fast_config());
        let (log, mut ticks) = event_log(&manager);

        assert_ok!(manager.connect().await);
        manager.close().await;
        wait_for(&mut ticks, 2).await;

        assert!(!manager.is_connected());
        assert_eq!(
            log.lock().unwrap().last(),
            Some(&ConnectionEvent::Disconnected {
                reason: Some("closed locally".to_string())
            })
        );
    }
}
