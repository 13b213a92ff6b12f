//! Services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules apply engine operations under the room lock and fan the
//! results out to connected sockets, so route handlers stay focused on
//! frame parsing and replies.

pub mod orientation;
pub mod room;
