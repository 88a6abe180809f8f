use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use skyhop_core::net::messages::{
    CollectibleRegistration, GameStateMsg, ItemCollectedMsg, PlayerJoinedMsg, PlayerLeftMsg,
    PlayerUpdateBroadcastMsg, PositionMsg,
};
use skyhop_core::player::PlayerId;
use skyhop_platformer::physics::Input;
use skyhop_platformer::{TickReport, World, WorldEvent};

use crate::connection::{ConnectionManager, ConnectionState, SessionListener};
use crate::storage::{BackgroundStyle, KeyValueStore, Preferences};

/// Read-only view of another session player. Never simulated locally.
#[derive(Debug, Clone, PartialEq)]
pub struct RemotePlayer {
    pub id: PlayerId,
    pub name: String,
    pub position: PositionMsg,
    pub score: u32,
}

impl RemotePlayer {
    fn placeholder(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: String::new(),
            position: PositionMsg::default(),
            score: 0,
        }
    }
}

/// Everything the relay tells us about other players.
#[derive(Debug, Default)]
struct RemoteMirror {
    local_id: PlayerId,
    players: BTreeMap<PlayerId, RemotePlayer>,
    /// collectible id -> collector, for items taken anywhere in the session.
    claimed: HashMap<String, PlayerId>,
    snapshot_received: bool,
}

impl RemoteMirror {
    fn new(local_id: &str) -> Self {
        Self {
            local_id: local_id.to_string(),
            ..Self::default()
        }
    }

    fn is_local(&self, id: &str) -> bool {
        self.local_id == id
    }
}

impl SessionListener for RemoteMirror {
    fn on_game_state(&mut self, state: &GameStateMsg) {
        self.players = state
            .players
            .iter()
            .filter(|p| !self.is_local(&p.id))
            .map(|p| {
                let player = RemotePlayer {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    position: p.position(),
                    score: p.score,
                };
                (p.id.clone(), player)
            })
            .collect();
        self.claimed = state
            .collectibles
            .iter()
            .filter_map(|c| Some((c.id.clone(), c.collected_by.clone()?)))
            .collect();
        self.snapshot_received = true;
    }

    fn on_player_joined(&mut self, joined: &PlayerJoinedMsg) {
        if self.is_local(&joined.player_id) {
            return;
        }
        self.players
            .entry(joined.player_id.clone())
            .or_insert_with(|| RemotePlayer::placeholder(&joined.player_id));
    }

    fn on_player_left(&mut self, left: &PlayerLeftMsg) {
        self.players.remove(&left.player_id);
    }

    fn on_player_update(&mut self, update: &PlayerUpdateBroadcastMsg) {
        if self.is_local(&update.player_id) {
            return;
        }
        let player = self
            .players
            .entry(update.player_id.clone())
            .or_insert_with(|| RemotePlayer::placeholder(&update.player_id));
        player.position = update.position;
        player.name.clone_from(&update.name);
        player.score = update.score;
    }

    fn on_item_collected(&mut self, item: &ItemCollectedMsg) {
        self.claimed
            .insert(item.collectible_id.clone(), item.player_id.clone());
        if let Some(player) = self.players.get_mut(&item.player_id) {
            player.name.clone_from(&item.name);
            player.score = item.score;
        }
    }
}

/// Local world plus its optional link to the relay.
pub struct ClientGame {
    world: World,
    connection: Option<ConnectionManager>,
    store: Box<dyn KeyValueStore>,
    prefs: Preferences,
    mirror: RemoteMirror,
    position_interval: Duration,
    since_position_send: Duration,
    /// Tag of the last level whose collectibles were sent to the relay.
    registered_tag: Option<String>,
}

impl ClientGame {
    /// Wrap `world`, applying persisted best score and speed unlock.
    pub fn new(
        mut world: World,
        store: Box<dyn KeyValueStore>,
        connection: Option<ConnectionManager>,
        position_interval: Duration,
    ) -> Self {
        let prefs = Preferences::load(store.as_ref());
        world.set_best_score(prefs.best_score);
        if prefs.speed_unlocked {
            world.unlock_speed();
        }
        let local_id = connection
            .as_ref()
            .map(|c| c.player_id().to_string())
            .unwrap_or_default();
        Self {
            world,
            connection,
            store,
            prefs,
            mirror: RemoteMirror::new(&local_id),
            position_interval,
            // Send the first position on the first tick
            since_position_send: position_interval,
            registered_tag: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn connection(&self) -> Option<&ConnectionManager> {
        self.connection.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::SinglePlayer, ConnectionManager::state)
    }

    pub fn is_host(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(ConnectionManager::is_host)
    }

    pub fn remote_players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.mirror.players.values()
    }

    pub fn remote_player(&self, id: &str) -> Option<&RemotePlayer> {
        self.mirror.players.get(id)
    }

    /// Who collected `collectible_id`, if the relay reported it.
    pub fn claimed_by(&self, collectible_id: &str) -> Option<&str> {
        self.mirror.claimed.get(collectible_id).map(String::as_str)
    }

    /// Advance the local world, then exchange state with the relay.
    pub fn tick(&mut self, input: &Input, dt: f32) -> TickReport {
        let report = self.world.tick(input, dt);
        self.persist(&report);

        let Some(conn) = self.connection.as_mut() else {
            return report;
        };
        conn.dispatch(&mut self.mirror);
        if std::mem::take(&mut self.mirror.snapshot_received) {
            // Fresh (re)join: the relay may not know this level yet
            self.registered_tag = None;
        }

        // Every client generates its own level, so each one registers it.
        // Queued ahead of the pickups so the relay knows the ids first.
        let level = self.world.level();
        if conn.is_connected() && self.registered_tag.as_deref() != Some(level.tag.as_str()) {
            let entries = level
                .collectibles
                .iter()
                .map(|c| CollectibleRegistration {
                    id: c.id.clone(),
                    kind: c.kind,
                })
                .collect();
            tracing::debug!(tag = %level.tag, "Registering level collectibles");
            conn.register_collectibles(entries);
            self.registered_tag = Some(level.tag.clone());
        }

        for id in report.collected_ids() {
            conn.collect_item(id);
        }

        self.since_position_send += Duration::try_from_secs_f32(dt).unwrap_or_default();
        if self.since_position_send >= self.position_interval {
            self.since_position_send = Duration::ZERO;
            let player = self.world.player();
            conn.update_position(PositionMsg {
                x: player.x,
                y: player.y,
                width: player.width,
                height: player.height,
                grow_level: player.grow_level,
            });
        }

        report
    }

    /// Back to level 1 from any state.
    pub fn restart(&mut self) -> TickReport {
        self.since_position_send = self.position_interval;
        self.world.restart()
    }

    pub fn set_show_fps(&mut self, show: bool) {
        if let Err(e) = self.prefs.set_show_fps(self.store.as_mut(), show) {
            tracing::warn!(error = %e, "Failed to save FPS preference");
        }
    }

    pub fn set_background_style(&mut self, style: BackgroundStyle) {
        if let Err(e) = self.prefs.set_background_style(self.store.as_mut(), style) {
            tracing::warn!(error = %e, "Failed to save background preference");
        }
    }

    fn persist(&mut self, report: &TickReport) {
        for event in &report.events {
            match event {
                WorldEvent::GameOver {
                    score,
                    new_best: true,
                } => {
                    tracing::info!(score, "New best score");
                    if let Err(e) = self.prefs.set_best_score(self.store.as_mut(), *score) {
                        tracing::warn!(error = %e, "Failed to save best score");
                    }
                },
                WorldEvent::SpeedUnlocked if !self.prefs.speed_unlocked => {
                    if let Err(e) = self.prefs.set_speed_unlocked(self.store.as_mut(), true) {
                        tracing::warn!(error = %e, "Failed to save speed unlock");
                    }
                },
                _ => {},
            }
        }
    }
}
