use std::time::Duration;

use serde::Deserialize;

/// Client configuration, loaded from `skyhop-client.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay base URL. `http(s)://` and `ws(s)://` forms are both accepted.
    pub server_url: String,
    pub player_name: Option<String>,
    pub probe_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_base_delay_ms: u64,
    pub ping_interval_ms: u64,
    pub position_send_interval_ms: u64,
    /// JSON file holding local preferences.
    pub storage_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3001".to_string(),
            player_name: None,
            probe_timeout_ms: 2000,
            connect_timeout_ms: 5000,
            max_reconnect_attempts: 3,
            reconnect_base_delay_ms: 1000,
            ping_interval_ms: 10_000,
            position_send_interval_ms: 50,
            storage_path: "skyhop-prefs.json".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load config from `skyhop-client.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = Self::load_from("skyhop-client.toml");
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    pub fn load_from(path: &str) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<ClientConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded client configuration from {path}");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse {path}: {e}, using defaults");
                    ClientConfig::default()
                },
            },
            Err(_) => {
                tracing::debug!("No {path} found, using defaults");
                ClientConfig::default()
            },
        }
    }

    /// Apply `SKYHOP_SERVER_URL` / `SKYHOP_PLAYER_NAME` read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SKYHOP_SERVER_URL")
            && !url.trim().is_empty()
        {
            self.server_url = url;
        }
        if let Some(name) = lookup("SKYHOP_PLAYER_NAME")
            && !name.trim().is_empty()
        {
            self.player_name = Some(name);
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.ping_interval_ms.max(1))
    }

    pub fn position_send_interval(&self) -> Duration {
        Duration::from_millis(self.position_send_interval_ms)
    }

    /// `http(s)://host:port` without a trailing slash.
    fn http_base(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = base.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            base.to_string()
        }
    }

    pub fn health_url(&self) -> String {
        format!("{}/health", self.http_base())
    }

    pub fn collectibles_url(&self) -> String {
        format!("{}/api/collectibles", self.http_base())
    }

    pub fn ws_url(&self) -> String {
        let base = self.http_base();
        let ws = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base
        };
        format!("{ws}/ws")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.probe_timeout(), Duration::from_secs(2));
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_reconnect_attempts, 3);
        assert_eq!(config.reconnect_base_delay(), Duration::from_secs(1));
        assert_eq!(config.position_send_interval(), Duration::from_millis(50));
        assert!(config.player_name.is_none());
    }

    #[test]
    fn urls_from_http_base() {
        let config = ClientConfig {
            server_url: "http://localhost:3001/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.health_url(), "http://localhost:3001/health");
        assert_eq!(
            config.collectibles_url(),
            "http://localhost:3001/api/collectibles"
        );
        assert_eq!(config.ws_url(), "ws://localhost:3001/ws");
    }

    #[test]
    fn urls_from_secure_ws_base() {
        let config = ClientConfig {
            server_url: "wss://play.example.com".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.health_url(), "https://play.example.com/health");
        assert_eq!(config.ws_url(), "wss://play.example.com/ws");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            server_url = "http://10.0.0.5:3001"
            max_reconnect_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.server_url, "http://10.0.0.5:3001");
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.probe_timeout_ms, 2000);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = ClientConfig::default();
        config.apply_overrides(|key| match key {
            "SKYHOP_SERVER_URL" => Some("http://relay:9000".to_string()),
            "SKYHOP_PLAYER_NAME" => Some("Ada".to_string()),
            _ => None,
        });
        assert_eq!(config.server_url, "http://relay:9000");
        assert_eq!(config.player_name.as_deref(), Some("Ada"));
    }

    #[test]
    fn blank_overrides_ignored() {
        let mut config = ClientConfig::default();
        config.apply_overrides(|_| Some("  ".to_string()));
        assert!(config.player_name.is_none());
        config.apply_overrides(|_| Some(String::new()));
        assert_eq!(config.server_url, "http://127.0.0.1:3001");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = ClientConfig::load_from("/nonexistent/skyhop-client.toml");
        assert_eq!(config.server_url, ClientConfig::default().server_url);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn with_url(url: String) -> ClientConfig {
            ClientConfig {
                server_url: url,
                ..ClientConfig::default()
            }
        }

        proptest! {
            #[test]
            fn http_and_ws_forms_address_the_same_relay(
                host in "[a-z][a-z0-9]{0,11}(\\.[a-z]{2,5})?",
                port in 1u16..,
                secure in any::<bool>(),
                trailing_slash in any::<bool>(),
            ) {
                let slash = if trailing_slash { "/" } else { "" };
                let (http, ws) = if secure { ("https", "wss") } else { ("http", "ws") };
                let from_http = with_url(format!("{http}://{host}:{port}{slash}"));
                let from_ws = with_url(format!("{ws}://{host}:{port}{slash}"));

                prop_assert_eq!(from_http.health_url(), from_ws.health_url());
                prop_assert_eq!(from_http.collectibles_url(), from_ws.collectibles_url());
                prop_assert_eq!(from_http.ws_url(), from_ws.ws_url());
                prop_assert_eq!(from_http.ws_url(), format!("{ws}://{host}:{port}/ws"));
                prop_assert_eq!(from_http.health_url(), format!("{http}://{host}:{port}/health"));
            }
        }
    }
}
