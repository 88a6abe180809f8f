use std::time::{Duration, Instant};

use tracing_subscriber::EnvFilter;

use skyhop_client::config::ClientConfig;
use skyhop_client::connection::{ConnectionManager, Identity};
use skyhop_client::game::ClientGame;
use skyhop_client::storage::FileStore;
use skyhop_platformer::World;
use skyhop_platformer::config::GameConfig;
use skyhop_platformer::physics::Input;
use skyhop_platformer::progression::GamePhase;

const FRAME: Duration = Duration::from_millis(16);
const STATUS_EVERY: Duration = Duration::from_secs(5);

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run right and hop every ~0.75 s.
fn autopilot(frame: u64) -> Input {
    Input {
        direction: 1.0,
        jump: frame % 45 < 6,
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let config = ClientConfig::load();
    let game_config = GameConfig::load();
    let identity = Identity::new(config.player_name.as_deref());
    tracing::info!(player_id = %identity.player_id, server = %config.server_url, "Starting headless client");

    let connection = ConnectionManager::connect(&config, identity).await;
    let store = FileStore::open(&config.storage_path);
    let mut game = ClientGame::new(
        World::new(game_config),
        Box::new(store),
        Some(connection),
        config.position_send_interval(),
    );

    let mut interval = tokio::time::interval(FRAME);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last = Instant::now();
    let mut last_status = Instant::now();
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {},
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            },
        }

        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32();
        last = now;
        frame += 1;

        game.tick(&autopilot(frame), dt);
        if game.world().phase() == GamePhase::GameOver {
            tracing::info!(best = game.world().best_score(), "Game over, restarting");
            game.restart();
        }

        if last_status.elapsed() >= STATUS_EVERY {
            last_status = Instant::now();
            let player = game.world().player();
            tracing::info!(
                level = game.world().level_number(),
                score = player.score,
                lives = player.lives,
                x = player.x,
                remote_players = game.remote_players().count(),
                connection = ?game.connection_state(),
                "Status"
            );
        }
    }
}
