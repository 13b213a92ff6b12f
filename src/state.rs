//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! There is exactly one room. Its engine state and the outbound channels
//! of every connected socket live behind one lock, so a request is applied
//! and its frames are queued before the next request is looked at.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::Room;
use crate::frame::Frame;

// =============================================================================
// ROOM STATE
// =============================================================================

pub struct RoomState {
    pub room: Room,
    /// Connected sockets: `client_id` -> sender for outgoing frames. A
    /// socket's `client_id` doubles as its participant id once it joins.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new(room: Room) -> Self {
        Self { room, clients: HashMap::new() }
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub room: Arc<RwLock<RoomState>>,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let room = Room::new(config.grid);
        Self { room: Arc::new(RwLock::new(RoomState::new(room))), config: Arc::new(config) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
