use axum::body::Bytes;
use axum::extract::State;
use axum::response::Json;
use serde_json::Value;

use skyhop_core::collectible::CollectibleKind;
use skyhop_core::net::messages::{CollectibleRegistration, RegisterCollectiblesResponse};

use crate::error::AppError;
use crate::state::AppState;

/// Pull the usable `{id, type}` entries out of a registration body. Entries
/// without a string id or a known type are skipped.
fn parse_registrations(body: &[u8]) -> Result<Vec<CollectibleRegistration>, AppError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))?;
    let Some(entries) = value.get("collectibles").and_then(Value::as_array) else {
        return Err(AppError::BadRequest(
            "collectibles must be an array".to_string(),
        ));
    };

    Ok(entries
        .iter()
        .filter_map(|entry| {
            let id = entry.get("id")?.as_str()?;
            let kind = CollectibleKind::from_tag(entry.get("type")?.as_str()?)?;
            (!id.is_empty()).then(|| CollectibleRegistration {
                id: id.to_string(),
                kind,
            })
        })
        .collect())
}

/// `POST /api/collectibles`: register a level's collectibles with the session.
pub async fn register_collectibles(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<RegisterCollectiblesResponse>, AppError> {
    let list = parse_registrations(&body)?;
    let added = state.session.write().await.register_collectibles(&list);
    tracing::debug!(received = list.len(), added, "Collectible registration");
    Ok(Json(RegisterCollectiblesResponse {
        status: "ok".to_string(),
        added,
    }))
}
