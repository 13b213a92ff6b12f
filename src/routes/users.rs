//! Roster snapshot route.

use axum::extract::State;
use axum::response::Json;

use crate::engine::ParticipantView;
use crate::services;
use crate::state::AppState;

/// `GET /api/users` — every participant with derived calibration state.
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<ParticipantView>> {
    Json(services::room::users(&state).await)
}
