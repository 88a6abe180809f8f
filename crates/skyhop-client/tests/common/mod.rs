use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;

use skyhop_client::config::ClientConfig;
use skyhop_client::connection::{ConnectionManager, ConnectionState};
use skyhop_client::game::ClientGame;
use skyhop_client::storage::MemoryStore;
use skyhop_platformer::World;
use skyhop_platformer::config::GameConfig;
use skyhop_platformer::physics::Input;
use skyhop_platformer::test_helpers::flat_level;

use skyhop_server::build_app;
use skyhop_server::config::ServerConfig;
use skyhop_server::state::AppState;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn new() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(ServerConfig::default());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            _shutdown: handle,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        client_config(&format!("http://{}", self.addr))
    }
}

/// Client config with short timeouts and backoff for tests.
pub fn client_config(server_url: &str) -> ClientConfig {
    ClientConfig {
        server_url: server_url.to_string(),
        probe_timeout_ms: 500,
        connect_timeout_ms: 1000,
        reconnect_base_delay_ms: 20,
        ..ClientConfig::default()
    }
}

/// An address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// Wait until the watched state satisfies `pred` (5s timeout).
pub async fn wait_for_state(
    rx: &mut watch::Receiver<ConnectionState>,
    pred: impl Fn(&ConnectionState) -> bool,
) -> ConnectionState {
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|s| pred(s)))
        .await
        .expect("Timed out waiting for connection state")
        .expect("Connection state sender dropped");
    *state
}

/// World on a long flat level, so ticking never ends the level.
pub fn flat_world() -> World {
    World::with_level(GameConfig::default(), flat_level(2000.0))
}

/// A game with in-memory preferences.
pub fn game(world: World, connection: Option<ConnectionManager>) -> ClientGame {
    ClientGame::new(
        world,
        Box::new(MemoryStore::new()),
        connection,
        // Stays under the relay's per-connection rate limit
        Duration::from_millis(50),
    )
}

/// Tick `games` round-robin until `pred` holds on `games[target]` (5s timeout).
pub async fn pump_until(
    games: &mut [&mut ClientGame],
    target: usize,
    input: Input,
    pred: impl Fn(&ClientGame) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        for game in games.iter_mut() {
            game.tick(&input, 1.0 / 60.0);
        }
        if pred(&*games[target]) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "Timed out pumping game loop"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
