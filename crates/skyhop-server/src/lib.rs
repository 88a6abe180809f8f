pub mod api;
pub mod config;
pub mod error;
pub mod health;
pub mod session;
pub mod state;
pub mod ws;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;

use config::ServerConfig;
use state::AppState;

/// Build the Axum router and application state from a config.
pub fn build_app(config: ServerConfig) -> (Router<()>, AppState) {
    let state = AppState::new(config);

    // Browser clients probe and register cross-origin
    let http_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/collectibles", post(api::register_collectibles))
        .layer(CorsLayer::permissive());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .merge(http_routes)
        .with_state(state.clone());

    (app, state)
}

/// Background task that evicts players who stopped sending anything.
pub fn spawn_inactivity_sweeper(state: AppState) -> JoinHandle<()> {
    let every = Duration::from_secs(state.config.session.cleanup_interval_secs);
    let max_idle = Duration::from_secs(state.config.session.inactivity_timeout_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            let evicted = state.session.write().await.cleanup_inactive(max_idle);
            if !evicted.is_empty() {
                tracing::info!(count = evicted.len(), "Evicted inactive players");
            }
        }
    })
}
