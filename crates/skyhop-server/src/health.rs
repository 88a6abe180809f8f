use axum::Json;
use axum::extract::State;

use skyhop_core::net::messages::HealthResponse;
use skyhop_core::time::timestamp_ms;

use crate::state::AppState;

/// Liveness probe used by clients before opening a socket.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let players = state.session.read().await.player_count();
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: timestamp_ms(),
        players,
    })
}
