use serde::{Deserialize, Serialize};

use crate::level_gen::LevelConfig;
use crate::physics::PhysicsConfig;
use crate::progression::ProgressionConfig;

/// Data-driven game tuning: physics, level layout and progression.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub level: LevelConfig,
    pub progression: ProgressionConfig,
}

impl GameConfig {
    /// Load config from `SKYHOP_GAME_CONFIG` or `config/game.toml`. Falls back
    /// to defaults if the file is missing or unparseable.
    pub fn load() -> Self {
        let path = std::env::var("SKYHOP_GAME_CONFIG")
            .unwrap_or_else(|_| "config/game.toml".to_string());
        Self::load_from(&path)
    }

    pub fn load_from(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<GameConfig>(&content) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    GameConfig::default()
                },
            },
            Err(_) => GameConfig::default(),
        }
    }
}
