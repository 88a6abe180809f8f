use serde::{Deserialize, Serialize};

/// Kinds of collectible placed on a level. Serialized in lowercase
/// (`"coin"`, `"heart"`, `"doublejump"`, `"grow"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectibleKind {
    Coin,
    Heart,
    DoubleJump,
    Grow,
}

impl CollectibleKind {
    /// Rare pickups appear at most once per level instance.
    pub fn is_rare(self) -> bool {
        !matches!(self, Self::Coin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coin => "coin",
            Self::Heart => "heart",
            Self::DoubleJump => "doublejump",
            Self::Grow => "grow",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "coin" => Some(Self::Coin),
            "heart" => Some(Self::Heart),
            "doublejump" => Some(Self::DoubleJump),
            "grow" => Some(Self::Grow),
            _ => None,
        }
    }
}

/// Rare pickups in placement priority order.
pub const RARE_KINDS: [CollectibleKind; 3] = [
    CollectibleKind::Heart,
    CollectibleKind::DoubleJump,
    CollectibleKind::Grow,
];
