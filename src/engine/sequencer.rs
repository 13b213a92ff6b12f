//! Calibration sequencer — who points at whom, and when.
//!
//! DESIGN
//! ======
//! Every participant calibrates in a fixed chain keyed by join index:
//!
//! | join index | 1st | 2nd   | 3rd   | required |
//! |------------|-----|-------|-------|----------|
//! | 0          | 1   | -     | -     | 1        |
//! | 1          | 0   | 2     | -     | 2        |
//! | n >= 2     | 0   | n - 1 | n + 1 | 3        |
//!
//! Only one participant is live at a time: the first one in join order that
//! still owes calibrations. The scan restarts from the head on every pass
//! because an early participant can owe a calibration toward someone who
//! joined later. When the live participant's partner is not in the roster
//! the pass emits nothing and the room stays quiescent until the roster
//! changes.

use uuid::Uuid;

use super::participant::{Participant, ParticipantView};
use super::roster::Roster;

/// Addressed "your turn" notice for the live participant.
#[derive(Debug, Clone, PartialEq)]
pub struct NextCalibration {
    pub participant_id: Uuid,
    pub partner: ParticipantView,
}

/// Number of calibrations a participant owes, by role.
#[must_use]
pub fn required_calibrations(join_index: u32) -> u32 {
    match join_index {
        0 => 1,
        1 => 2,
        _ => 3,
    }
}

/// Join index of the partner for a participant's next calibration.
#[must_use]
pub fn next_partner_index(join_index: u32, calibration_count: u32) -> Option<u32> {
    match (calibration_count, join_index) {
        (0, 0) => Some(1),
        (0, _) => Some(0),
        (1, 0) => None,
        (1, 1) => Some(2),
        (1, n) => Some(n - 1),
        (2, n) if n >= 2 => n.checked_add(1),
        _ => None,
    }
}

/// Partner for the participant's next calibration, if that partner is present.
#[must_use]
pub fn next_partner<'a>(roster: &'a Roster, participant: &Participant) -> Option<&'a Participant> {
    if participant.has_calibrated() {
        return None;
    }
    let index = next_partner_index(participant.join_index(), participant.calibration_count())?;
    roster.find_by_index(index)
}

/// True when this calibration (with `count_before` earlier ones) anchors the
/// participant to the grid.
#[must_use]
pub fn anchors_on(join_index: u32, count_before: u32) -> bool {
    if join_index <= 1 { count_before == 0 } else { count_before == 1 }
}

/// True once a participant with `count` calibrations has enough bearings to
/// be placed on the grid.
#[must_use]
pub fn is_positionable(join_index: u32, count: u32) -> bool {
    if join_index <= 1 { count >= 1 } else { count >= 2 }
}

/// Pick the live participant and its partner.
///
/// Returns `None` for rosters with fewer than two participants, when
/// everybody is done, or when the live participant's partner has not
/// joined (or has left).
#[must_use]
pub fn advance(roster: &Roster) -> Option<NextCalibration> {
    if roster.len() < 2 {
        return None;
    }
    let live = roster.all().find(|p| !p.has_calibrated())?;
    let partner = next_partner(roster, live)?;
    Some(NextCalibration { participant_id: live.id(), partner: partner.view() })
}

#[cfg(test)]
#[path = "sequencer_test.rs"]
mod tests;
