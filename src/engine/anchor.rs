//! Grid anchoring — a participant's compass offset from the shared grid.
//!
//! The reference participant defines grid bearing 0 as its own bearing to
//! join index 1. Everyone else anchors on the calibration toward a partner
//! that is already anchored and whose latest bearing points back at them:
//!
//! ```text
//! angle_to_grid = norm(bearing - grid(partner_last_bearing) - 180)
//! ```

use super::EngineError;
use super::angle::{local_to_grid, normalize_signed};
use super::participant::{Calibration, Participant};
use super::roster::Roster;

/// Compute `participant`'s angle to the grid from the calibration that
/// anchors it.
///
/// # Errors
///
/// - `NotFound` if the calibration's target is not in the roster.
/// - `AnchorNotReady` if the target has no grid angle yet, or its latest
///   bearing is not toward `participant`.
pub fn angle_to_grid(participant: &Participant, calibration: &Calibration, roster: &Roster) -> Result<f64, EngineError> {
    if participant.is_reference() {
        return Ok(normalize_signed(calibration.bearing));
    }

    let partner = roster.find_by_id(calibration.target_id)?;
    let Some(partner_angle) = partner.angle_to_grid() else {
        return Err(EngineError::AnchorNotReady(partner.id()));
    };
    let Some(partner_last) = partner.last_calibration() else {
        return Err(EngineError::AnchorNotReady(partner.id()));
    };
    if partner_last.target_id != participant.id() {
        return Err(EngineError::AnchorNotReady(partner.id()));
    }

    let partner_to_us = local_to_grid(partner_last.bearing, partner_angle);
    Ok(normalize_signed(calibration.bearing - partner_to_us - 180.0))
}

#[cfg(test)]
#[path = "anchor_test.rs"]
mod tests;
