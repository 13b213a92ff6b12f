//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One axum router carries the websocket endpoint devices talk to, a small
//! REST surface for operators, and the static device UI as the fallback.

pub mod users;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let public = ServeDir::new(&state.config.public_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/users", get(users::list_users))
        .route("/api/ws", get(ws::handle_ws))
        .fallback_service(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
