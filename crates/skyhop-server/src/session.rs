use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use axum::extract::ws::Utf8Bytes;
use tokio::sync::mpsc;

use skyhop_core::collectible::CollectibleKind;
use skyhop_core::net::messages::{
    CollectibleRegistration, CollectibleSnapshot, GameStateMsg, ItemCollectedMsg, PlayerJoinedMsg,
    PlayerLeftMsg, PlayerSnapshot, PlayerUpdateBroadcastMsg, PositionMsg, ServerMessage,
};
use skyhop_core::net::protocol::encode_server_message;
use skyhop_core::player::{PlayerId, default_name, sanitize_name};
use skyhop_core::time::timestamp_ms;

/// Per-player sender for outbound WebSocket text frames. Bounded so a slow
/// client cannot exhaust memory; full channels are skipped on broadcast.
pub type PlayerSender = mpsc::Sender<Utf8Bytes>;

/// Identifies one socket. A reconnecting player gets a new one.
pub type ConnectionId = u64;

/// Mirror assigned to a player before its first position update.
const INITIAL_POSITION: PositionMsg = PositionMsg {
    x: 100.0,
    y: 350.0,
    width: 40.0,
    height: 50.0,
    grow_level: 0,
};

struct SessionPlayer {
    id: PlayerId,
    position: PositionMsg,
    name: String,
    score: u32,
    last_seen: Instant,
    connection_id: ConnectionId,
    sender: PlayerSender,
}

#[derive(Debug, Clone, PartialEq)]
struct CollectibleEntry {
    kind: CollectibleKind,
    collected: bool,
    collected_by: Option<PlayerId>,
}

/// The relay-held shared view: players in join order, registered
/// collectibles and the host role.
pub struct Session {
    players: Vec<SessionPlayer>,
    collectibles: BTreeMap<String, CollectibleEntry>,
    host_id: Option<PlayerId>,
    join_counter: u32,
    next_connection_id: ConnectionId,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            players: Vec::new(),
            collectibles: BTreeMap::new(),
            host_id: None,
            join_counter: 0,
            next_connection_id: 1,
        }
    }

    fn player(&self, player_id: &str) -> Option<&SessionPlayer> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn player_mut(&mut self, player_id: &str) -> Option<&mut SessionPlayer> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    /// Whether `connection_id` is the socket currently bound to `player_id`.
    pub fn is_bound(&self, player_id: &str, connection_id: ConnectionId) -> bool {
        self.player(player_id)
            .is_some_and(|p| p.connection_id == connection_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn host_id(&self) -> Option<&str> {
        self.host_id.as_deref()
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.player(player_id).is_some()
    }

    /// Player ids in join order.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id.clone()).collect()
    }

    pub fn player_name(&self, player_id: &str) -> Option<&str> {
        self.player(player_id).map(|p| p.name.as_str())
    }

    pub fn player_score(&self, player_id: &str) -> Option<u32> {
        self.player(player_id).map(|p| p.score)
    }

    pub fn is_collected(&self, collectible_id: &str) -> Option<bool> {
        self.collectibles.get(collectible_id).map(|c| c.collected)
    }

    pub fn collectible_count(&self) -> usize {
        self.collectibles.len()
    }

    /// Add a player, or rebind the socket of one already present. Returns the
    /// connection id bound to `sender`.
    pub fn join(
        &mut self,
        player_id: &str,
        name: Option<&str>,
        sender: PlayerSender,
    ) -> ConnectionId {
        let connection_id = self.next_connection_id;
        self.next_connection_id += 1;
        let name = name.and_then(sanitize_name);

        if let Some(existing) = self.player_mut(player_id) {
            existing.sender = sender;
            existing.connection_id = connection_id;
            existing.last_seen = Instant::now();
            if let Some(name) = name {
                existing.name = name;
            }
            tracing::info!(player_id, "Player rejoined");
        } else {
            self.join_counter += 1;
            let name = name.unwrap_or_else(|| default_name(self.join_counter));
            if self.players.is_empty() {
                self.host_id = Some(player_id.to_string());
            }
            self.players.push(SessionPlayer {
                id: player_id.to_string(),
                position: INITIAL_POSITION,
                name,
                score: 0,
                last_seen: Instant::now(),
                connection_id,
                sender,
            });
            tracing::info!(
                player_id,
                players = self.players.len(),
                "Player joined"
            );
        }

        let is_host = self.host_id.as_deref() == Some(player_id);
        self.broadcast(&ServerMessage::PlayerJoined(PlayerJoinedMsg {
            player_id: player_id.to_string(),
            is_host,
            timestamp: timestamp_ms(),
        }));
        self.send_game_state(player_id);
        connection_id
    }

    /// Remove a player. The next player in join order inherits the host role.
    pub fn leave(&mut self, player_id: &str) {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return;
        };
        self.players.remove(index);

        if self.host_id.as_deref() == Some(player_id) {
            self.host_id = self.players.first().map(|p| p.id.clone());
            if let Some(ref new_host) = self.host_id {
                tracing::info!(player_id = %new_host, "Host migrated");
            }
        }
        tracing::info!(
            player_id,
            players = self.players.len(),
            "Player left"
        );

        self.broadcast(&ServerMessage::PlayerLeft(PlayerLeftMsg {
            player_id: player_id.to_string(),
            timestamp: timestamp_ms(),
        }));
    }

    /// `leave` only if `connection_id` is still the player's live socket.
    /// Returns true if the player was removed.
    pub fn disconnect(&mut self, player_id: &str, connection_id: ConnectionId) -> bool {
        match self.player(player_id) {
            Some(p) if p.connection_id == connection_id => {
                self.leave(player_id);
                true
            },
            Some(_) => {
                tracing::debug!(player_id, connection_id, "Stale socket closed");
                false
            },
            None => false,
        }
    }

    pub fn update_position(&mut self, player_id: &str, position: PositionMsg) {
        let Some(player) = self.player_mut(player_id) else {
            return;
        };
        player.position = position;
        player.last_seen = Instant::now();
        let msg = ServerMessage::PlayerUpdate(PlayerUpdateBroadcastMsg {
            player_id: player.id.clone(),
            position,
            name: player.name.clone(),
            score: player.score,
            timestamp: timestamp_ms(),
        });
        self.broadcast_except(player_id, &msg);
    }

    /// Register collectibles the session has not seen. Returns how many were
    /// added; known ids are left untouched.
    pub fn register_collectibles(&mut self, list: &[CollectibleRegistration]) -> usize {
        let mut added = 0;
        for entry in list {
            if entry.id.is_empty() || self.collectibles.contains_key(&entry.id) {
                continue;
            }
            self.collectibles.insert(
                entry.id.clone(),
                CollectibleEntry {
                    kind: entry.kind,
                    collected: false,
                    collected_by: None,
                },
            );
            added += 1;
        }
        if added > 0 {
            tracing::debug!(added, total = self.collectibles.len(), "Collectibles registered");
        }
        added
    }

    /// Mark a registered collectible collected. Returns true on the first
    /// collection; unknown players, unknown ids and repeats do nothing.
    pub fn collect_item(&mut self, player_id: &str, collectible_id: &str) -> bool {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return false;
        };
        let Some(entry) = self.collectibles.get_mut(collectible_id) else {
            tracing::debug!(player_id, collectible_id, "Unknown collectible");
            return false;
        };
        if entry.collected {
            return false;
        }
        entry.collected = true;
        entry.collected_by = Some(player_id.to_string());

        let player = &mut self.players[index];
        player.last_seen = Instant::now();
        if entry.kind == CollectibleKind::Coin {
            player.score += 1;
        }
        let msg = ServerMessage::ItemCollected(ItemCollectedMsg {
            player_id: player.id.clone(),
            collectible_id: collectible_id.to_string(),
            name: player.name.clone(),
            score: player.score,
            timestamp: timestamp_ms(),
        });
        self.broadcast(&msg);
        true
    }

    /// Refresh a player's liveness without changing anything else.
    pub fn touch(&mut self, player_id: &str) {
        if let Some(player) = self.player_mut(player_id) {
            player.last_seen = Instant::now();
        }
    }

    /// Evict players not seen within `max_idle`, through the `leave` path.
    pub fn cleanup_inactive(&mut self, max_idle: Duration) -> Vec<PlayerId> {
        let now = Instant::now();
        let stale: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| now.duration_since(p.last_seen) > max_idle)
            .map(|p| p.id.clone())
            .collect();
        for id in &stale {
            tracing::info!(player_id = %id, "Removing inactive player");
            self.leave(id);
        }
        stale
    }

    pub fn snapshot(&self) -> GameStateMsg {
        GameStateMsg {
            players: self
                .players
                .iter()
                .map(|p| PlayerSnapshot {
                    id: p.id.clone(),
                    x: p.position.x,
                    y: p.position.y,
                    width: p.position.width,
                    height: p.position.height,
                    grow_level: p.position.grow_level,
                    is_host: self.host_id.as_deref() == Some(p.id.as_str()),
                    name: p.name.clone(),
                    score: p.score,
                })
                .collect(),
            collectibles: self
                .collectibles
                .iter()
                .map(|(id, c)| CollectibleSnapshot {
                    id: id.clone(),
                    kind: c.kind,
                    collected: c.collected,
                    collected_by: c.collected_by.clone(),
                })
                .collect(),
            timestamp: timestamp_ms(),
        }
    }

    fn send_game_state(&self, player_id: &str) {
        let msg = ServerMessage::GameState(self.snapshot());
        match encode_server_message(&msg) {
            Ok(text) => self.send_to_player(player_id, Utf8Bytes::from(text)),
            Err(e) => tracing::warn!(player_id, error = %e, "Failed to encode game state"),
        }
    }

    /// Queue a frame for one player. Full or closed channels are skipped.
    pub fn send_to_player(&self, player_id: &str, data: Utf8Bytes) {
        if let Some(player) = self.player(player_id)
            && let Err(e) = player.sender.try_send(data)
        {
            tracing::debug!(
                player_id, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    fn broadcast(&self, msg: &ServerMessage) {
        self.fan_out(None, msg);
    }

    fn broadcast_except(&self, exclude: &str, msg: &ServerMessage) {
        self.fan_out(Some(exclude), msg);
    }

    fn fan_out(&self, exclude: Option<&str>, msg: &ServerMessage) {
        let text = match encode_server_message(msg) {
            Ok(text) => Utf8Bytes::from(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode broadcast");
                return;
            },
        };
        for player in &self.players {
            if exclude == Some(player.id.as_str()) {
                continue;
            }
            if let Err(e) = player.sender.try_send(text.clone()) {
                tracing::debug!(
                    player_id = %player.id, error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }
}
