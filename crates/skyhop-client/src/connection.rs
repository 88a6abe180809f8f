use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use skyhop_core::net::messages::{
    ClientMessage, CollectItemMsg, CollectibleRegistration, GameStateMsg, ItemCollectedMsg,
    JoinMsg, PingMsg, PlayerJoinedMsg, PlayerLeftMsg, PlayerUpdateBroadcastMsg, PlayerUpdateMsg,
    PositionMsg, RegisterCollectiblesRequest, RegisterCollectiblesResponse, ServerMessage,
};
use skyhop_core::net::protocol::{ProtocolError, decode_server_message, encode_client_message};
use skyhop_core::player::{PlayerId, generate_player_id, sanitize_name};
use skyhop_core::time::timestamp_ms;

use crate::config::ClientConfig;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where the manager is in its connect/reconnect lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Probing,
    Connected,
    Reconnecting { attempt: u32 },
    /// Terminal: no socket, every send is dropped.
    SinglePlayer,
}

/// Who this client joins as. Reused verbatim on every reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub player_id: PlayerId,
    pub name: Option<String>,
}

impl Identity {
    /// Fresh random id with an optional display name.
    pub fn new(name: Option<&str>) -> Self {
        Self {
            player_id: generate_player_id(),
            name: name.and_then(sanitize_name),
        }
    }
}

#[derive(Debug)]
pub enum ConnectionError {
    Probe(String),
    Connect(String),
    Send(String),
    Timeout(&'static str),
    Protocol(ProtocolError),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Probe(e) => write!(f, "health probe failed: {e}"),
            Self::Connect(e) => write!(f, "websocket connect failed: {e}"),
            Self::Send(e) => write!(f, "send failed: {e}"),
            Self::Timeout(what) => write!(f, "{what} timed out"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {}

impl From<ProtocolError> for ConnectionError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

/// Callbacks for decoded relay messages, run on the thread that calls
/// [`ConnectionManager::dispatch`].
pub trait SessionListener {
    fn on_game_state(&mut self, _state: &GameStateMsg) {}
    fn on_player_joined(&mut self, _joined: &PlayerJoinedMsg) {}
    fn on_player_left(&mut self, _left: &PlayerLeftMsg) {}
    fn on_player_update(&mut self, _update: &PlayerUpdateBroadcastMsg) {}
    fn on_item_collected(&mut self, _item: &ItemCollectedMsg) {}
}

/// Delay before reconnect attempt `attempt` (1-based): `base × attempt`.
pub fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

/// `GET health_url`; only a 2xx answer within `timeout` counts.
pub async fn probe(health_url: &str, timeout: Duration) -> Result<(), ConnectionError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConnectionError::Probe(e.to_string()))?;
    let resp = client.get(health_url).send().await.map_err(|e| {
        if e.is_timeout() {
            ConnectionError::Timeout("health probe")
        } else {
            ConnectionError::Probe(e.to_string())
        }
    })?;
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(ConnectionError::Probe(format!(
            "health check returned {}",
            resp.status()
        )))
    }
}

async fn send_message<S>(sink: &mut S, msg: &ClientMessage) -> Result<(), ConnectionError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = encode_client_message(msg)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| ConnectionError::Send(e.to_string()))
}

/// Open the socket and send `join`.
async fn open_session(
    config: &ClientConfig,
    identity: &Identity,
) -> Result<WsStream, ConnectionError> {
    let url = config.ws_url();
    let (mut ws, _) =
        tokio::time::timeout(config.connect_timeout(), tokio_tungstenite::connect_async(url))
            .await
            .map_err(|_| ConnectionError::Timeout("websocket connect"))?
            .map_err(|e| ConnectionError::Connect(e.to_string()))?;

    let join = ClientMessage::Join(JoinMsg {
        player_id: identity.player_id.clone(),
        name: identity.name.clone(),
        timestamp: timestamp_ms(),
    });
    send_message(&mut ws, &join).await?;
    Ok(ws)
}

enum Outbound {
    Message(ClientMessage),
    Register(RegisterCollectiblesRequest),
}

enum SessionEnd {
    /// The manager went away.
    Shutdown,
    Disconnected,
}

/// Background task owning the socket. Talks to the manager only through
/// channels.
struct SessionTask {
    config: ClientConfig,
    identity: Identity,
    http: reqwest::Client,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    inbound: mpsc::UnboundedSender<ServerMessage>,
    state: watch::Sender<ConnectionState>,
}

impl SessionTask {
    async fn run(mut self, mut ws: WsStream) {
        loop {
            if let SessionEnd::Shutdown = self.drive(ws).await {
                tracing::debug!("Connection manager dropped, closing session");
                return;
            }
            tracing::info!(player_id = %self.identity.player_id, "Disconnected from relay");

            match self.reconnect().await {
                Some(next) => ws = next,
                None => {
                    tracing::warn!(
                        attempts = self.config.max_reconnect_attempts,
                        "Reconnect attempts exhausted, continuing in single-player mode"
                    );
                    self.state.send_replace(ConnectionState::SinglePlayer);
                    return;
                },
            }
        }
    }

    async fn drive(&mut self, ws: WsStream) -> SessionEnd {
        let (mut sink, mut stream) = ws.split();
        let mut ping = tokio::time::interval(self.config.ping_interval());
        // The first tick completes immediately
        ping.tick().await;

        loop {
            tokio::select! {
                out = self.outbound.recv() => {
                    let Some(out) = out else {
                        let _ = sink.close().await;
                        return SessionEnd::Shutdown;
                    };
                    match out {
                        Outbound::Message(msg) => {
                            if let Err(e) = send_message(&mut sink, &msg).await {
                                tracing::warn!(error = %e, "Relay send failed");
                                return SessionEnd::Disconnected;
                            }
                        },
                        // Awaited inline so later collectItem frames reach the
                        // relay only after the ids are known
                        Outbound::Register(body) => self.register(body).await,
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.deliver(text.as_str()),
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Disconnected,
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Relay socket error");
                        return SessionEnd::Disconnected;
                    },
                },
                _ = ping.tick() => {
                    let msg = ClientMessage::Ping(PingMsg { timestamp: timestamp_ms() });
                    if let Err(e) = send_message(&mut sink, &msg).await {
                        tracing::warn!(error = %e, "Relay ping failed");
                        return SessionEnd::Disconnected;
                    }
                },
            }
        }
    }

    fn deliver(&self, text: &str) {
        match decode_server_message(text) {
            Ok(msg) => {
                // The manager may already be gone
                let _ = self.inbound.send(msg);
            },
            Err(e) => tracing::warn!(error = %e, "Dropping undecodable relay message"),
        }
    }

    async fn register(&self, body: RegisterCollectiblesRequest) {
        let sent = body.collectibles.len();
        let request = self
            .http
            .post(self.config.collectibles_url())
            .timeout(self.config.connect_timeout())
            .json(&body)
            .send();
        match request.await {
            Ok(resp) if resp.status().is_success() => {
                match resp.json::<RegisterCollectiblesResponse>().await {
                    Ok(r) => tracing::debug!(sent, added = r.added, "Registered collectibles"),
                    Err(e) => tracing::warn!(error = %e, "Unreadable registration response"),
                }
            },
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "Collectible registration rejected")
            },
            Err(e) => tracing::warn!(error = %e, "Collectible registration failed"),
        }
    }

    /// Returns `None` when every attempt failed or the manager went away.
    async fn reconnect(&mut self) -> Option<WsStream> {
        let max = self.config.max_reconnect_attempts;
        for attempt in 1..=max {
            self.state
                .send_replace(ConnectionState::Reconnecting { attempt });
            let delay = reconnect_delay(self.config.reconnect_base_delay(), attempt);
            tracing::info!(
                attempt,
                max,
                delay_ms = delay.as_millis() as u64,
                "Attempting to reconnect"
            );
            tokio::time::sleep(delay).await;

            // Anything queued while offline is stale
            loop {
                match self.outbound.try_recv() {
                    Ok(_) => continue,
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return None,
                }
            }

            if let Err(e) = probe(&self.config.health_url(), self.config.probe_timeout()).await {
                tracing::warn!(attempt, error = %e, "Reconnect probe failed");
                continue;
            }
            match open_session(&self.config, &self.identity).await {
                Ok(ws) => {
                    tracing::info!(attempt, player_id = %self.identity.player_id, "Reconnected to relay");
                    self.state.send_replace(ConnectionState::Connected);
                    return Some(ws);
                },
                Err(e) => tracing::warn!(attempt, error = %e, "Reconnect failed"),
            }
        }
        None
    }
}

/// Client side of the relay connection. Owned by the game thread; all I/O
/// happens in a background task.
pub struct ConnectionManager {
    identity: Identity,
    outbound: Option<mpsc::UnboundedSender<Outbound>>,
    inbound: Option<mpsc::UnboundedReceiver<ServerMessage>>,
    state: watch::Receiver<ConnectionState>,
    /// Session players in join order, as far as this client has seen.
    roster: Vec<PlayerId>,
    host_id: Option<PlayerId>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Probe the relay and join it. Never fails: any connectivity problem
    /// yields a manager in `SinglePlayer` mode.
    pub async fn connect(config: &ClientConfig, identity: Identity) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Probing);

        if let Err(e) = probe(&config.health_url(), config.probe_timeout()).await {
            tracing::info!(error = %e, "Relay not available, running in single-player mode");
            state_tx.send_replace(ConnectionState::SinglePlayer);
            return Self::offline(identity, state_rx);
        }

        let ws = match open_session(config, &identity).await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::info!(error = %e, "Relay connect failed, running in single-player mode");
                state_tx.send_replace(ConnectionState::SinglePlayer);
                return Self::offline(identity, state_rx);
            },
        };
        state_tx.send_replace(ConnectionState::Connected);
        tracing::info!(player_id = %identity.player_id, "Connected to relay");

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let task = SessionTask {
            config: config.clone(),
            identity: identity.clone(),
            http: reqwest::Client::new(),
            outbound: out_rx,
            inbound: in_tx,
            state: state_tx,
        };
        let handle = tokio::spawn(task.run(ws));

        Self {
            identity,
            outbound: Some(out_tx),
            inbound: Some(in_rx),
            state: state_rx,
            roster: Vec::new(),
            host_id: None,
            task: Some(handle),
        }
    }

    /// Manager that never touches the network.
    pub fn single_player(identity: Identity) -> Self {
        let (_, state_rx) = watch::channel(ConnectionState::SinglePlayer);
        Self::offline(identity, state_rx)
    }

    fn offline(identity: Identity, state: watch::Receiver<ConnectionState>) -> Self {
        Self {
            identity,
            outbound: None,
            inbound: None,
            state,
            roster: Vec::new(),
            host_id: None,
            task: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn player_id(&self) -> &str {
        &self.identity.player_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch handle for state changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn is_host(&self) -> bool {
        self.host_id.as_deref() == Some(self.identity.player_id.as_str())
    }

    /// Session players in join order, including this client.
    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    fn send(&self, msg: Outbound) {
        if !self.is_connected() {
            return;
        }
        if let Some(tx) = &self.outbound {
            let _ = tx.send(msg);
        }
    }

    pub fn update_position(&self, position: PositionMsg) {
        self.send(Outbound::Message(ClientMessage::PlayerUpdate(
            PlayerUpdateMsg {
                player_id: self.identity.player_id.clone(),
                position,
                timestamp: timestamp_ms(),
            },
        )));
    }

    pub fn collect_item(&self, collectible_id: &str) {
        self.send(Outbound::Message(ClientMessage::CollectItem(
            CollectItemMsg {
                player_id: self.identity.player_id.clone(),
                collectible_id: collectible_id.to_string(),
                timestamp: timestamp_ms(),
            },
        )));
    }

    pub fn ping(&self) {
        self.send(Outbound::Message(ClientMessage::Ping(PingMsg {
            timestamp: timestamp_ms(),
        })));
    }

    /// POST the given collectibles to the relay's registry. Messages queued
    /// after this call are sent once the relay has answered.
    pub fn register_collectibles(&self, collectibles: Vec<CollectibleRegistration>) {
        if collectibles.is_empty() {
            return;
        }
        self.send(Outbound::Register(RegisterCollectiblesRequest {
            collectibles,
        }));
    }

    /// Take every message received since the last call.
    pub fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        if let Some(rx) = self.inbound.as_mut() {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        for msg in &messages {
            self.observe(msg);
        }
        messages
    }

    /// Drain and hand each message to `listener`. Returns the number handled.
    pub fn dispatch(&mut self, listener: &mut impl SessionListener) -> usize {
        let messages = self.drain();
        for msg in &messages {
            match msg {
                ServerMessage::GameState(state) => listener.on_game_state(state),
                ServerMessage::PlayerJoined(joined) => listener.on_player_joined(joined),
                ServerMessage::PlayerLeft(left) => listener.on_player_left(left),
                ServerMessage::PlayerUpdate(update) => listener.on_player_update(update),
                ServerMessage::ItemCollected(item) => listener.on_item_collected(item),
                ServerMessage::Pong(_) => {},
            }
        }
        messages.len()
    }

    /// Track roster and host. The relay never announces a migrated host, so
    /// apply its rule locally: the earliest remaining joiner inherits.
    fn observe(&mut self, msg: &ServerMessage) {
        match msg {
            ServerMessage::GameState(state) => {
                self.roster = state.players.iter().map(|p| p.id.clone()).collect();
                self.host_id = state
                    .players
                    .iter()
                    .find(|p| p.is_host)
                    .map(|p| p.id.clone());
            },
            ServerMessage::PlayerJoined(joined) => {
                if !self.roster.contains(&joined.player_id) {
                    self.roster.push(joined.player_id.clone());
                }
                if joined.is_host {
                    self.host_id = Some(joined.player_id.clone());
                }
                if joined.player_id == self.identity.player_id {
                    tracing::info!(is_host = joined.is_host, "Joined session");
                }
            },
            ServerMessage::PlayerLeft(left) => {
                self.roster.retain(|id| *id != left.player_id);
                if self.host_id.as_deref() == Some(left.player_id.as_str()) {
                    self.host_id = self.roster.first().cloned();
                }
            },
            _ => {},
        }
    }

    /// Close the socket and wait for the background task to finish.
    pub async fn close(mut self) {
        self.outbound.take();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
