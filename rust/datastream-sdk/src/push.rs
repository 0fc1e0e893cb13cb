use crate::config::ConnectionConfig;
use crate::datapoint::Datapoint;
use crate::error::{Result, StreamError};
use crate::subscription::{parse_update, ClientMessage, SubscriptionCallback, SubscriptionRegistry};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const INSERT_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent, server-initiated delivery channel.
///
/// Delivery order, threading and retry of subscription callbacks belong to
/// the implementation; streams only pick the channel name and delegate.
#[async_trait]
pub trait PushConnection: Send + Sync {
    /// Best-effort insert. `false` means the caller should fall back to HTTP.
    async fn insert(&self, channel: &str, points: &[Datapoint]) -> bool;

    async fn subscribe(&self, channel: &str, callback: SubscriptionCallback) -> Result<()>;

    async fn unsubscribe(&self, channel: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Error,
}

enum PushCommand {
    Subscribe(String),
    Unsubscribe(String),
    Insert {
        channel: String,
        points: Vec<Datapoint>,
        reply: oneshot::Sender<bool>,
    },
    Disconnect,
}

struct PushClientInner {
    url: String,
    state: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<SubscriptionRegistry>>,
    command_tx: mpsc::Sender<PushCommand>,
}

/// WebSocket [`PushConnection`] with automatic reconnect.
///
/// Subscriptions are remembered and replayed after every reconnect.
/// Callbacks run on the connection task, so a slow callback delays every
/// other channel.
#[derive(Clone)]
pub struct PushClient {
    inner: Arc<PushClientInner>,
}

impl PushClient {
    /// Spawns the connection loop. Must be called from within a tokio runtime.
    pub fn connect(url: impl Into<String>, api_key: Option<String>, config: ConnectionConfig) -> Self {
        let url = url.into();
        let (command_tx, command_rx) = mpsc::channel(100);
        let state = Arc::new(RwLock::new(ConnectionState::Disconnected));
        let subscriptions = Arc::new(RwLock::new(SubscriptionRegistry::new()));

        spawn_connection_loop(
            url.clone(),
            api_key,
            state.clone(),
            subscriptions.clone(),
            config,
            command_rx,
        );

        Self {
            inner: Arc::new(PushClientInner {
                url,
                state,
                subscriptions,
                command_tx,
            }),
        }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    pub async fn subscribed_channels(&self) -> Vec<String> {
        self.inner.subscriptions.read().await.channels()
    }

    pub async fn disconnect(&self) {
        let _ = self.inner.command_tx.send(PushCommand::Disconnect).await;
    }

    async fn send_command(&self, command: PushCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .await
            .map_err(|_| StreamError::ConnectionClosed)
    }
}

#[async_trait]
impl PushConnection for PushClient {
    async fn insert(&self, channel: &str, points: &[Datapoint]) -> bool {
        if self.state().await != ConnectionState::Connected {
            return false;
        }

        let (reply, ack) = oneshot::channel();
        let command = PushCommand::Insert {
            channel: channel.to_string(),
            points: points.to_vec(),
            reply,
        };
        if self.send_command(command).await.is_err() {
            return false;
        }

        matches!(timeout(INSERT_TIMEOUT, ack).await, Ok(Ok(true)))
    }

    async fn subscribe(&self, channel: &str, callback: SubscriptionCallback) -> Result<()> {
        self.inner
            .subscriptions
            .write()
            .await
            .add(channel.to_string(), callback);
        let sent = self
            .send_command(PushCommand::Subscribe(channel.to_string()))
            .await;
        if sent.is_err() {
            self.inner.subscriptions.write().await.remove(channel);
        }
        sent
    }

    async fn unsubscribe(&self, channel: &str) -> Result<()> {
        self.inner.subscriptions.write().await.remove(channel);
        self.send_command(PushCommand::Unsubscribe(channel.to_string()))
            .await
    }
}

fn build_request(url: &str, api_key: Option<&str>) -> Result<Request> {
    let mut request = url.into_client_request()?;
    if let Some(key) = api_key {
        let value = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|e| StreamError::UnexpectedResponse(format!("invalid API key: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

fn encode(message: &ClientMessage) -> Option<Message> {
    serde_json::to_string(message).ok().map(Message::Text)
}

/// Channels already subscribed on the current socket.
#[derive(Default)]
struct ActiveChannels(HashSet<String>);

impl ActiveChannels {
    /// `None` when the channel was already announced, e.g. by the replay
    /// after a reconnect.
    fn subscribe(&mut self, channel: String) -> Option<ClientMessage> {
        if !self.0.insert(channel.clone()) {
            return None;
        }
        Some(ClientMessage::Subscribe { arg: channel })
    }

    fn unsubscribe(&mut self, channel: String) -> ClientMessage {
        self.0.remove(&channel);
        ClientMessage::Unsubscribe { arg: channel }
    }
}

async fn forward_insert<S>(
    ws_tx: &mut S,
    channel: String,
    points: Vec<Datapoint>,
    reply: oneshot::Sender<bool>,
) where
    S: Sink<Message> + Unpin,
{
    // The caller timed out and has already written over HTTP.
    if reply.is_closed() {
        tracing::warn!(
            "Dropping stale push insert of {} datapoints into {}",
            points.len(),
            channel
        );
        return;
    }

    let sent = match encode(&ClientMessage::Insert { arg: channel, d: points }) {
        Some(msg) => ws_tx.send(msg).await.is_ok(),
        None => false,
    };
    let _ = reply.send(sent);
}

async fn dispatch(subscriptions: &RwLock<SubscriptionRegistry>, bytes: &[u8]) {
    let update = match parse_update(bytes) {
        Ok(update) => update,
        Err(e) => {
            tracing::debug!("Ignoring unrecognized push message: {}", e);
            return;
        }
    };

    let callback = subscriptions.read().await.get(&update.stream);
    match callback {
        Some(callback) => callback(&update),
        None => tracing::debug!("No subscriber for channel {}", update.stream),
    }
}

fn spawn_connection_loop(
    url: String,
    api_key: Option<String>,
    state: Arc<RwLock<ConnectionState>>,
    subscriptions: Arc<RwLock<SubscriptionRegistry>>,
    config: ConnectionConfig,
    mut command_rx: mpsc::Receiver<PushCommand>,
) {
    tokio::spawn(async move {
        let mut reconnect_attempt: u32 = 0;
        let mut should_run = true;

        while should_run {
            *state.write().await = ConnectionState::Connecting;

            let connected = match build_request(&url, api_key.as_deref()) {
                Ok(request) => connect_async(request).await.map_err(StreamError::from),
                Err(e) => Err(e),
            };

            match connected {
                Ok((ws, _)) => {
                    *state.write().await = ConnectionState::Connected;
                    reconnect_attempt = 0;
                    tracing::info!("Push connection established to {}", url);

                    let (mut ws_tx, mut ws_rx) = ws.split();

                    let mut active = ActiveChannels::default();
                    let channels = subscriptions.read().await.channels();
                    for channel in channels {
                        if let Some(msg) = active.subscribe(channel).as_ref().and_then(encode) {
                            let _ = ws_tx.send(msg).await;
                        }
                    }

                    let mut ping_timer = tokio::time::interval(config.ping_interval);

                    loop {
                        tokio::select! {
                            msg = ws_rx.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        dispatch(&subscriptions, text.as_bytes()).await;
                                    }
                                    Some(Ok(Message::Binary(bytes))) => {
                                        dispatch(&subscriptions, &bytes).await;
                                    }
                                    Some(Ok(Message::Ping(payload))) => {
                                        let _ = ws_tx.send(Message::Pong(payload)).await;
                                    }
                                    Some(Ok(Message::Close(_))) | None => {
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        tracing::warn!("Push connection error: {}", e);
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                            cmd = command_rx.recv() => {
                                match cmd {
                                    Some(PushCommand::Subscribe(channel)) => {
                                        if let Some(msg) = active.subscribe(channel).as_ref().and_then(encode) {
                                            let _ = ws_tx.send(msg).await;
                                        }
                                    }
                                    Some(PushCommand::Unsubscribe(channel)) => {
                                        if let Some(msg) = encode(&active.unsubscribe(channel)) {
                                            let _ = ws_tx.send(msg).await;
                                        }
                                    }
                                    Some(PushCommand::Insert { channel, points, reply }) => {
                                        forward_insert(&mut ws_tx, channel, points, reply).await;
                                    }
                                    Some(PushCommand::Disconnect) => {
                                        let _ = ws_tx.close().await;
                                        *state.write().await = ConnectionState::Disconnected;
                                        should_run = false;
                                        break;
                                    }
                                    None => {
                                        should_run = false;
                                        break;
                                    }
                                }
                            }
                            _ = ping_timer.tick() => {
                                let _ = ws_tx.send(Message::Ping(vec![])).await;
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Push connection failed: {}", e);
                }
            }

            if !should_run {
                break;
            }

            if !config.auto_reconnect || reconnect_attempt >= config.max_reconnect_attempts {
                *state.write().await = ConnectionState::Error;
                break;
            }

            let delay = config.reconnect_delay(reconnect_attempt);

            *state.write().await = ConnectionState::Reconnecting {
                attempt: reconnect_attempt,
            };
            reconnect_attempt += 1;

            tracing::info!(
                "Reconnecting in {:?} (attempt {})",
                delay,
                reconnect_attempt
            );
            sleep(delay).await;
        }
    });
}
