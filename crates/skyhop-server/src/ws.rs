use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use skyhop_core::net::messages::{ClientMessage, JoinMsg, PongMsg, ServerMessage};
use skyhop_core::net::protocol::{decode_client_message, decode_message_type, encode_server_message};
use skyhop_core::player::PlayerId;
use skyhop_core::time::timestamp_ms;

use crate::session::{ConnectionId, PlayerSender, Session};
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state))
        .into_response())
}

/// The player a socket has joined as, and the connection id the session
/// bound to it.
type Binding = Option<(PlayerId, ConnectionId)>;

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);

    spawn_writer(ws_sender, rx);

    let mut binding: Binding = None;
    read_loop(&mut ws_receiver, &state, &tx, &mut binding).await;

    // Socket closed: leave unless the player already rejoined elsewhere
    if let Some((player_id, connection_id)) = binding {
        let removed = state
            .session
            .write()
            .await
            .disconnect(&player_id, connection_id);
        if removed {
            tracing::info!(player_id = %player_id, "Player disconnected");
        }
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    tx: &PlayerSender,
    binding: &mut Binding,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let max_size = state.config.limits.max_message_size;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };
        let data = text.as_str();

        // Drop oversized messages
        if data.len() > max_size {
            tracing::warn!(size = data.len(), "Dropping oversized frame");
            continue;
        }

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(player_id = ?binding.as_ref().map(|b| &b.0), "Rate limited");
            continue;
        }

        let msg_type = match decode_message_type(data) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping undecodable frame");
                continue;
            },
        };

        if !msg_type.is_client_message() {
            tracing::warn!(?msg_type, "Rejected server-only message from client");
            continue;
        }

        let client_msg = match decode_client_message(data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(?msg_type, error = %e, "Malformed client message");
                continue;
            },
        };

        match client_msg {
            ClientMessage::Join(join) => handle_join(state, tx, binding, join).await,

            // Everything below acts on the connection-bound id, never the
            // id carried in the payload.
            ClientMessage::PlayerUpdate(update) => {
                let mut session = state.session.write().await;
                if let Some(player_id) = bound_player(&session, binding) {
                    session.update_position(player_id, update.position);
                }
            },

            ClientMessage::CollectItem(collect) => {
                let mut session = state.session.write().await;
                if let Some(player_id) = bound_player(&session, binding) {
                    let collected = session.collect_item(player_id, &collect.collectible_id);
                    if collected {
                        tracing::debug!(
                            player_id = %player_id,
                            collectible_id = %collect.collectible_id,
                            "Item collected"
                        );
                    }
                }
            },

            ClientMessage::Ping(_) => {
                {
                    let mut session = state.session.write().await;
                    if let Some(player_id) = bound_player(&session, binding) {
                        session.touch(player_id);
                    }
                }
                send_pong(tx);
            },
        }
    }
}

/// The player this socket acts for, unless a newer socket has since joined
/// with the same id.
fn bound_player<'a>(session: &Session, binding: &'a Binding) -> Option<&'a str> {
    let (player_id, connection_id) = binding.as_ref()?;
    if session.is_bound(player_id, *connection_id) {
        Some(player_id.as_str())
    } else {
        tracing::debug!(player_id = %player_id, connection_id, "Ignoring frame from superseded socket");
        None
    }
}

async fn handle_join(state: &AppState, tx: &PlayerSender, binding: &mut Binding, join: JoinMsg) {
    if join.player_id.trim().is_empty() {
        tracing::warn!("Join without a player id");
        return;
    }

    let mut session = state.session.write().await;

    // Switching identity on an open socket releases the old one first
    if let Some((old_id, old_conn)) = binding.take()
        && old_id != join.player_id
    {
        session.disconnect(&old_id, old_conn);
    }

    let connection_id = session.join(&join.player_id, join.name.as_deref(), tx.clone());
    *binding = Some((join.player_id, connection_id));
}

fn send_pong(tx: &PlayerSender) {
    let msg = ServerMessage::Pong(PongMsg {
        timestamp: timestamp_ms(),
    });
    match encode_server_message(&msg) {
        Ok(text) => {
            if let Err(e) = tx.try_send(Utf8Bytes::from(text)) {
                tracing::debug!(error = %e, "Failed to queue pong");
            }
        },
        Err(e) => tracing::warn!(error = %e, "Failed to encode pong"),
    }
}
