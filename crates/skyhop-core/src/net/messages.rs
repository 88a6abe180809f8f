use serde::{Deserialize, Serialize};

use crate::collectible::CollectibleKind;
use crate::player::PlayerId;

/// Wire message kind, carried in the `type` field of every JSON frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // Client -> Server
    Join,
    PlayerUpdate,
    CollectItem,
    Ping,

    // Server -> Client
    PlayerJoined,
    PlayerLeft,
    GameState,
    ItemCollected,
    Pong,
}

impl MessageType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "join" => Some(Self::Join),
            "playerUpdate" => Some(Self::PlayerUpdate),
            "collectItem" => Some(Self::CollectItem),
            "ping" => Some(Self::Ping),
            "playerJoined" => Some(Self::PlayerJoined),
            "playerLeft" => Some(Self::PlayerLeft),
            "gameState" => Some(Self::GameState),
            "itemCollected" => Some(Self::ItemCollected),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::PlayerUpdate => "playerUpdate",
            Self::CollectItem => "collectItem",
            Self::Ping => "ping",
            Self::PlayerJoined => "playerJoined",
            Self::PlayerLeft => "playerLeft",
            Self::GameState => "gameState",
            Self::ItemCollected => "itemCollected",
            Self::Pong => "pong",
        }
    }

    /// Whether a client may send this kind. `playerUpdate` travels both ways.
    pub fn is_client_message(self) -> bool {
        matches!(
            self,
            Self::Join | Self::PlayerUpdate | Self::CollectItem | Self::Ping
        )
    }

    pub fn is_server_message(self) -> bool {
        !matches!(self, Self::Join | Self::CollectItem | Self::Ping)
    }
}

/// Reported body of a player: position, size and grow level.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionMsg {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub grow_level: u8,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    Join(JoinMsg),
    PlayerUpdate(PlayerUpdateMsg),
    CollectItem(CollectItemMsg),
    Ping(PingMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinMsg {
    pub player_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateMsg {
    pub player_id: PlayerId,
    pub position: PositionMsg,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectItemMsg {
    pub player_id: PlayerId,
    pub collectible_id: String,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PingMsg {
    #[serde(default)]
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    PlayerJoined(PlayerJoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    GameState(GameStateMsg),
    PlayerUpdate(PlayerUpdateBroadcastMsg),
    ItemCollected(ItemCollectedMsg),
    Pong(PongMsg),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerJoinedMsg {
    pub player_id: PlayerId,
    pub is_host: bool,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
    #[serde(default)]
    pub timestamp: u64,
}

/// Full session snapshot sent to a joining player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateMsg {
    pub players: Vec<PlayerSnapshot>,
    pub collectibles: Vec<CollectibleSnapshot>,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub grow_level: u8,
    pub is_host: bool,
    pub name: String,
    pub score: u32,
}

impl PlayerSnapshot {
    pub fn position(&self) -> PositionMsg {
        PositionMsg {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
            grow_level: self.grow_level,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectibleSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CollectibleKind,
    pub collected: bool,
    pub collected_by: Option<PlayerId>,
}

/// Relayed position of another player, decorated with name and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerUpdateBroadcastMsg {
    pub player_id: PlayerId,
    pub position: PositionMsg,
    pub name: String,
    pub score: u32,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemCollectedMsg {
    pub player_id: PlayerId,
    pub collectible_id: String,
    pub name: String,
    pub score: u32,
    #[serde(default)]
    pub timestamp: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PongMsg {
    #[serde(default)]
    pub timestamp: u64,
}

// ---------------------------------------------------------------------------
// HTTP payloads
// ---------------------------------------------------------------------------

/// `GET /health` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: u64,
    #[serde(default)]
    pub players: usize,
}

/// One entry of a `POST /api/collectibles` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectibleRegistration {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: CollectibleKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterCollectiblesRequest {
    pub collectibles: Vec<CollectibleRegistration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterCollectiblesResponse {
    pub status: String,
    pub added: usize,
}
