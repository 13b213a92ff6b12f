//! Orientation service — live device heading and tilt relay.
//!
//! Orientation readings are ephemeral: resolved against the current grid,
//! broadcast to peers and forgotten. Readings from a socket that has not
//! joined are dropped.

use uuid::Uuid;

use crate::engine::EngineError;
use crate::engine::angle::finite;
use crate::engine::pointing::pointing_at;
use crate::frame::{Data, Frame};
use crate::state::AppState;

/// One compass/tilt sample in the device's local frame, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    pub heading: f64,
    pub tilt_lr: f64,
    pub tilt_fb: f64,
}

/// Broadcast a reading to every peer except the sender, tagged with the
/// participant it is pointing at. Returns `false` when the reading was
/// dropped because the sender is not in the room.
///
/// # Errors
///
/// Returns `InvalidAngle` for non-finite readings.
pub async fn relay(state: &AppState, client_id: Uuid, reading: Orientation) -> Result<bool, EngineError> {
    finite(reading.tilt_lr)?;
    finite(reading.tilt_fb)?;

    let guard = state.room.read().await;
    if !guard.room.roster().contains(client_id) {
        return Ok(false);
    }
    let target = pointing_at(&guard.room, client_id, reading.heading)?;

    let mut data = Data::new();
    data.insert("participant_id".into(), serde_json::json!(client_id));
    data.insert("heading".into(), serde_json::json!(reading.heading));
    data.insert("tilt_lr".into(), serde_json::json!(reading.tilt_lr));
    data.insert("tilt_fb".into(), serde_json::json!(reading.tilt_fb));
    data.insert("pointing_at".into(), serde_json::json!(target));

    let frame = Frame::request("device:orientation", data).with_from(client_id.to_string());
    super::room::broadcast(&guard, &frame, Some(client_id));
    Ok(true)
}

#[cfg(test)]
#[path = "orientation_test.rs"]
mod tests;
