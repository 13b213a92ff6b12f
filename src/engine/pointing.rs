//! "Which peer is this device pointing at?"
//!
//! Converts a live compass heading into the grid frame with the device's
//! angle to grid, then picks the positioned peer whose grid bearing is
//! closest. Peers outside `max_pointing_deviation` are never matched.

use uuid::Uuid;

use super::angle::{angular_distance, finite, local_to_grid};
use super::{EngineError, Room};

/// Peer `participant_id` is pointing at with local `heading`, if any.
///
/// Returns `Ok(None)` while the participant is not yet anchored and
/// positioned, or when nobody lies inside the pointing cone.
///
/// # Errors
///
/// - `InvalidAngle` for a non-finite heading.
/// - `NotFound` if `participant_id` is not in the room.
pub fn pointing_at(room: &Room, participant_id: Uuid, heading: f64) -> Result<Option<Uuid>, EngineError> {
    let heading = finite(heading)?;
    let me = room.participant(participant_id)?;
    let (Some(angle_to_grid), Some(origin)) = (me.angle_to_grid(), me.position()) else {
        return Ok(None);
    };
    let grid_heading = local_to_grid(heading, angle_to_grid);
    let tolerance = room.config().max_pointing_deviation;

    let best = room
        .roster()
        .all()
        .filter(|p| p.id() != participant_id)
        .filter_map(|p| {
            let target = p.position()?;
            let deviation = angular_distance(grid_heading, origin.bearing_to(target));
            (deviation <= tolerance).then_some((p.id(), deviation))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1));

    Ok(best.map(|(id, _)| id))
}

#[cfg(test)]
#[path = "pointing_test.rs"]
mod tests;
