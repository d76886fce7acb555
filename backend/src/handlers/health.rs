use axum::{extract::State, Json};
use serde::Serialize;
use taskdeck_shared::{ApiResponse, FeatureFlags};

use super::envelope;
use crate::auth::Caller;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
}

pub async fn health() -> Json<ApiResponse<Health>> {
    envelope(Health { status: "ok" })
}

/// Flags as the UI should see them. AI counts as off when no provider is
/// configured.
pub async fn features(State(state): State<AppState>, _caller: Caller) -> Json<ApiResponse<FeatureFlags>> {
    let mut flags = state.config.features;
    flags.ai_suggestions = state.assistant.is_some();
    envelope(flags)
}
