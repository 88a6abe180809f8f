#[allow(dead_code)]
mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use tokio::sync::Mutex;

use skyhop_client::connection::{ConnectionManager, ConnectionState, Identity};
use skyhop_core::net::messages::{ClientMessage, PositionMsg};
use skyhop_core::net::protocol::decode_client_message;
use skyhop_platformer::physics::Input;
use skyhop_platformer::test_helpers::flat_level;
use skyhop_platformer::World;
use skyhop_platformer::config::GameConfig;

use common::{client_config, flat_world, game, unused_addr, wait_for_state};

const DT: f32 = 1.0 / 60.0;

#[tokio::test]
async fn no_server_means_single_player() {
    let config = client_config(&format!("http://{}", unused_addr()));
    let mgr = ConnectionManager::connect(&config, Identity::new(Some("Solo"))).await;
    assert_eq!(mgr.state(), ConnectionState::SinglePlayer);
    assert!(!mgr.is_connected());

    // Sends are silently dropped
    mgr.update_position(PositionMsg::default());
    mgr.collect_item("anything");
    mgr.ping();
}

#[tokio::test]
async fn single_player_body_still_falls_and_moves() {
    let config = client_config(&format!("http://{}", unused_addr()));
    let mgr = ConnectionManager::connect(&config, Identity::new(None)).await;

    // No floor: the body must fall
    let mut level = flat_level(2000.0);
    level.platforms.clear();
    let mut falling = game(World::with_level(GameConfig::default(), level), Some(mgr));
    let start_y = falling.world().player().y;
    for _ in 0..10 {
        falling.tick(&Input::default(), DT);
    }
    assert!(falling.world().player().y > start_y);
    assert!(!falling.world().player().on_ground);
    assert_eq!(falling.connection_state(), ConnectionState::SinglePlayer);

    // On a floor: input moves it
    let mut walking = game(flat_world(), None);
    let start_x = walking.world().player().x;
    let right = Input {
        direction: 1.0,
        jump: false,
    };
    for _ in 0..20 {
        walking.tick(&right, DT);
    }
    assert!(walking.world().player().x > start_x + 40.0);
}

/// Relay stand-in that drops the first session right after its join.
#[derive(Default)]
struct FlakyRelay {
    healthy: AtomicBool,
    /// Report unhealthy once the first session has been dropped.
    stay_down: bool,
    probes: AtomicUsize,
    sessions: AtomicUsize,
    joins: Mutex<Vec<String>>,
}

async fn flaky_health(State(relay): State<Arc<FlakyRelay>>) -> StatusCode {
    relay.probes.fetch_add(1, Ordering::SeqCst);
    if relay.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn flaky_ws(State(relay): State<Arc<FlakyRelay>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        if let Some(Ok(Message::Text(text))) = socket.recv().await {
            relay.joins.lock().await.push(text.as_str().to_string());
        }
        if relay.sessions.fetch_add(1, Ordering::SeqCst) == 0 {
            if relay.stay_down {
                relay.healthy.store(false, Ordering::SeqCst);
            }
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
        while let Some(Ok(_)) = socket.recv().await {}
    })
}

async fn spawn_flaky_relay(stay_down: bool) -> (String, Arc<FlakyRelay>) {
    let relay = Arc::new(FlakyRelay {
        healthy: AtomicBool::new(true),
        stay_down,
        ..FlakyRelay::default()
    });
    let app = Router::new()
        .route("/health", get(flaky_health))
        .route("/ws", get(flaky_ws))
        .with_state(Arc::clone(&relay));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    (format!("http://{addr}"), relay)
}

#[tokio::test]
async fn reconnects_and_rejoins_with_same_identity() {
    let (url, relay) = spawn_flaky_relay(false).await;
    let identity = Identity::new(Some("Rita"));
    let mgr = ConnectionManager::connect(&client_config(&url), identity.clone()).await;

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while relay.joins.lock().await.len() < 2 {
        assert!(tokio::time::Instant::now() < deadline, "No rejoin seen");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let mut rx = mgr.subscribe();
    wait_for_state(&mut rx, |s| *s == ConnectionState::Connected).await;

    let joins = relay.joins.lock().await.clone();
    for raw in &joins {
        match decode_client_message(raw).unwrap() {
            ClientMessage::Join(join) => {
                assert_eq!(join.player_id, identity.player_id);
                assert_eq!(join.name.as_deref(), Some("Rita"));
            },
            other => panic!("Expected Join, got: {other:?}"),
        }
    }
    mgr.close().await;
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let (url, relay) = spawn_flaky_relay(true).await;
    let config = client_config(&url);
    let mgr = ConnectionManager::connect(&config, Identity::new(None)).await;

    let mut rx = mgr.subscribe();
    let state = wait_for_state(&mut rx, |s| *s == ConnectionState::SinglePlayer).await;
    assert_eq!(state, ConnectionState::SinglePlayer);

    // One probe to connect, then one per reconnect attempt
    assert_eq!(
        relay.probes.load(Ordering::SeqCst),
        1 + config.max_reconnect_attempts as usize
    );
    assert_eq!(relay.sessions.load(Ordering::SeqCst), 1);

    mgr.update_position(PositionMsg::default());
    assert!(!mgr.is_connected());
}
