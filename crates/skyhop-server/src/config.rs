use serde::Deserialize;

use skyhop_core::net::protocol::MAX_MESSAGE_SIZE;

/// Top-level server configuration, loaded from `skyhop.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3001".to_string(),
            limits: LimitsConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    pub player_message_buffer: usize,
    /// Inbound frames larger than this are dropped unread.
    pub max_message_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }
}

/// Player liveness.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub inactivity_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_secs: 30,
            cleanup_interval_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Check the config for values the server cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.limits.max_ws_connections == 0 {
            return Err("limits.max_ws_connections must be > 0".to_string());
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err("limits.ws_rate_limit_per_sec must be > 0".to_string());
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        if self.limits.max_message_size == 0 {
            return Err("limits.max_message_size must be > 0".to_string());
        }
        if self.session.inactivity_timeout_secs == 0 {
            return Err("session.inactivity_timeout_secs must be > 0".to_string());
        }
        if self.session.cleanup_interval_secs == 0 {
            return Err("session.cleanup_interval_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Load config from `skyhop.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from("skyhop.toml");
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No {path} found, using defaults");
                ServerConfig::default()
            },
        }
    }

    /// Apply `SKYHOP_*` overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("SKYHOP_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(val) = lookup("SKYHOP_WS_RATE_LIMIT")
            && let Ok(n) = val.parse::<f64>()
        {
            self.limits.ws_rate_limit_per_sec = n;
        }
        if let Some(val) = lookup("SKYHOP_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.max_ws_connections = n;
        }
        if let Some(val) = lookup("SKYHOP_INACTIVITY_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            self.session.inactivity_timeout_secs = n;
        }
    }
}
