//! Participant data model.
//!
//! DESIGN
//! ======
//! Counters and sticky flags are derived, never stored: the calibration
//! count is the length of the append-only calibration log, `has_calibrated`
//! compares that count with the role's requirement, and `is_positioned` is
//! `position.is_some()`. Nothing can set them back.
//!
//! Fields are private; only the engine mutates a participant, and only by
//! appending a calibration or filling an unset anchor/position once.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sequencer;

// =============================================================================
// VALUE TYPES
// =============================================================================

/// Public fields supplied by the device when it joins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub color: String,
}

/// One recorded bearing from a participant toward another, in its local frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub target_id: Uuid,
    pub bearing: f64,
}

/// A point in grid units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Self = Self { x: 0.0, y: 0.0 };

    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance_to(&self, other: Position) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Grid bearing from `self` toward `other`, in `(-180, 180]`.
    #[must_use]
    pub fn bearing_to(&self, other: Position) -> f64 {
        let rad = (other.x - self.x).atan2(other.y - self.y);
        super::angle::normalize_signed(super::angle::to_degrees(rad))
    }
}

// =============================================================================
// PARTICIPANT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    id: Uuid,
    join_index: u32,
    profile: Profile,
    calibrations: Vec<Calibration>,
    angle_to_grid: Option<f64>,
    position: Option<Position>,
}

impl Participant {
    #[must_use]
    pub fn new(id: Uuid, join_index: u32, profile: Profile) -> Self {
        Self { id, join_index, profile, calibrations: Vec::new(), angle_to_grid: None, position: None }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn join_index(&self) -> u32 {
        self.join_index
    }

    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    #[must_use]
    pub fn is_reference(&self) -> bool {
        self.join_index == 0
    }

    #[must_use]
    pub fn calibrations(&self) -> &[Calibration] {
        &self.calibrations
    }

    #[must_use]
    pub fn calibration_count(&self) -> u32 {
        u32::try_from(self.calibrations.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn first_calibration(&self) -> Option<&Calibration> {
        self.calibrations.first()
    }

    /// The most recent calibration. For a participant that has just been
    /// asked to calibrate toward a peer, this is its bearing to that peer.
    #[must_use]
    pub fn last_calibration(&self) -> Option<&Calibration> {
        self.calibrations.last()
    }

    #[must_use]
    pub fn angle_to_grid(&self) -> Option<f64> {
        self.angle_to_grid
    }

    #[must_use]
    pub fn position(&self) -> Option<Position> {
        self.position
    }

    #[must_use]
    pub fn is_positioned(&self) -> bool {
        self.position.is_some()
    }

    #[must_use]
    pub fn has_calibrated(&self) -> bool {
        self.calibration_count() >= sequencer::required_calibrations(self.join_index)
    }

    pub(super) fn record_calibration(&mut self, calibration: Calibration) {
        self.calibrations.push(calibration);
    }

    pub(super) fn set_angle_to_grid(&mut self, angle: f64) {
        debug_assert!(self.angle_to_grid.is_none(), "angle to grid is set once");
        self.angle_to_grid.get_or_insert(angle);
    }

    pub(super) fn set_position(&mut self, position: Position) {
        debug_assert!(self.position.is_none(), "position is set once");
        self.position.get_or_insert(position);
    }

    /// Wire representation, including the derived fields.
    #[must_use]
    pub fn view(&self) -> ParticipantView {
        ParticipantView {
            id: self.id,
            join_index: self.join_index,
            is_reference: self.is_reference(),
            name: self.profile.name.clone(),
            color: self.profile.color.clone(),
            calibration_count: self.calibration_count(),
            calibrations: self.calibrations.clone(),
            angle_to_grid: self.angle_to_grid,
            has_calibrated: self.has_calibrated(),
            position: self.position,
            is_positioned: self.is_positioned(),
        }
    }
}

/// Snapshot of a participant as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantView {
    pub id: Uuid,
    pub join_index: u32,
    pub is_reference: bool,
    pub name: String,
    pub color: String,
    pub calibration_count: u32,
    pub calibrations: Vec<Calibration>,
    pub angle_to_grid: Option<f64>,
    pub has_calibrated: bool,
    pub position: Option<Position>,
    pub is_positioned: bool,
}
