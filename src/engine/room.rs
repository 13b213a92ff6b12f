//! Room — the single owner of roster and calibration state.
//!
//! DESIGN
//! ======
//! Every operation validates and computes against a staged copy of the
//! affected participant, then commits in one step. A rejected request leaves
//! the room exactly as it was. Operations return the closed set of
//! `RoomEvent`s the transport must deliver; the room never talks to clients
//! itself.
//!
//! ERROR HANDLING
//! ==============
//! - Bad input (`InvalidAngle`, `NotFound`, `DuplicateParticipant`,
//!   `SelfCalibration`, `AlreadyCalibrated`, `UnexpectedTarget`): rejected,
//!   no mutation. A calibration must point at the partner the chain names
//!   for the sender's next slot; anchoring and triangulation read bearings
//!   by slot.
//! - Out of turn (`AnchorNotReady`, `PredecessorNotPositioned`): rejected,
//!   no mutation, logged at error level.
//! - `DegenerateGeometry`: the calibration is kept, the participant stays
//!   unplaced and a `PositionFailed` event reports it. A later calibration
//!   by the same participant tries again.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::participant::{Calibration, Participant, ParticipantView, Position, Profile};
use super::roster::Roster;
use super::sequencer::{self, NextCalibration};
use super::{EngineError, anchor, angle, position};

pub const DEFAULT_REFERENCE_LENGTH: f64 = 100.0;
pub const DEFAULT_MAX_POINTING_DEVIATION: f64 = 30.0;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridConfig {
    /// Grid distance between join index 0 and join index 1.
    pub reference_length: f64,
    /// Half-width, in degrees, of the cone a device counts as "pointing at"
    /// a peer. Only the pointing consumer reads this.
    pub max_pointing_deviation: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { reference_length: DEFAULT_REFERENCE_LENGTH, max_pointing_deviation: DEFAULT_MAX_POINTING_DEVIATION }
    }
}

/// One entry of the positions log, in the order positions were computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub participant_id: Uuid,
    pub join_index: u32,
    pub position: Position,
}

/// Everything the transport has to deliver after an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Reply to the joiner; peers get the roster.
    Joined { participant: ParticipantView, users: Vec<ParticipantView> },
    /// Broadcast to the room.
    Left { removed: ParticipantView, users: Vec<ParticipantView> },
    /// A calibration was recorded.
    UsersUpdated { changed: ParticipantView, users: Vec<ParticipantView> },
    /// A participant was placed on the grid.
    PositionComputed { changed: ParticipantView, users: Vec<ParticipantView>, positions: Vec<PositionRecord> },
    /// Placing the participant failed; its calibration was still recorded.
    PositionFailed { changed: ParticipantView, error: EngineError },
    /// Addressed to `participant_id` only.
    NextCalibration(NextCalibration),
    /// All participants were cleared.
    Reset,
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct Room {
    roster: Roster,
    positions: Vec<PositionRecord>,
    config: GridConfig,
}

impl Room {
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        Self { roster: Roster::new(), positions: Vec::new(), config }
    }

    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    #[must_use]
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    #[must_use]
    pub fn users(&self) -> Vec<ParticipantView> {
        self.roster.snapshot()
    }

    #[must_use]
    pub fn positions(&self) -> &[PositionRecord] {
        &self.positions
    }

    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn participant(&self, id: Uuid) -> Result<&Participant, EngineError> {
        self.roster.find_by_id(id)
    }

    /// Whose turn it is, if anyone's.
    #[must_use]
    pub fn next_calibration(&self) -> Option<NextCalibration> {
        sequencer::advance(&self.roster)
    }

    /// Add a participant and run a sequencing pass.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateParticipant` if `id` is already in the room.
    pub fn join(&mut self, id: Uuid, profile: Profile) -> Result<Vec<RoomEvent>, EngineError> {
        let join_index = self.roster.add(id, profile)?;
        info!(participant_id = %id, join_index, users = self.roster.len(), "room: participant joined");

        let participant = self.roster.find_by_id(id)?.view();
        let mut events = vec![RoomEvent::Joined { participant, users: self.users() }];
        self.push_next(&mut events);
        Ok(events)
    }

    /// Remove a participant and run a sequencing pass.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for unknown ids.
    pub fn leave(&mut self, id: Uuid) -> Result<Vec<RoomEvent>, EngineError> {
        let removed = self.roster.remove(id)?;
        info!(
            participant_id = %id,
            join_index = removed.join_index(),
            users = self.roster.len(),
            "room: participant left"
        );

        let mut events = vec![RoomEvent::Left { removed: removed.view(), users: self.users() }];
        self.push_next(&mut events);
        Ok(events)
    }

    /// Record a bearing from `id` toward `target_id`, anchoring and placing
    /// the participant when this calibration makes that possible.
    ///
    /// # Errors
    ///
    /// See the module docs. On error nothing is mutated.
    pub fn submit_calibration(&mut self, id: Uuid, target_id: Uuid, bearing: f64) -> Result<Vec<RoomEvent>, EngineError> {
        let bearing = angle::finite(bearing)?;
        let current = self.roster.find_by_id(id)?;
        let target = self.roster.find_by_id(target_id)?;
        if target_id == id {
            return Err(EngineError::SelfCalibration(id));
        }
        if current.has_calibrated() {
            return Err(EngineError::AlreadyCalibrated(id));
        }
        let expected = sequencer::next_partner_index(current.join_index(), current.calibration_count());
        if expected != Some(target.join_index()) {
            warn!(participant_id = %id, target_id = %target_id, ?expected, "room: calibration toward unexpected partner");
            return Err(EngineError::UnexpectedTarget { participant: id, target: target_id, expected });
        }

        let count_before = current.calibration_count();
        let calibration = Calibration { target_id, bearing };
        let mut staged = current.clone();
        staged.record_calibration(calibration);

        if sequencer::anchors_on(staged.join_index(), count_before) && staged.angle_to_grid().is_none() {
            let angle_to_grid = anchor::angle_to_grid(&staged, &calibration, &self.roster).inspect_err(log_rejection)?;
            info!(participant_id = %id, join_index = staged.join_index(), angle_to_grid, "room: participant anchored");
            staged.set_angle_to_grid(angle_to_grid);
        }

        let mut failure = None;
        if sequencer::is_positionable(staged.join_index(), staged.calibration_count()) && !staged.is_positioned() {
            match position::solve(&staged, &self.roster, self.config.reference_length) {
                Ok(pos) => {
                    info!(participant_id = %id, join_index = staged.join_index(), x = pos.x, y = pos.y, "room: participant positioned");
                    staged.set_position(pos);
                }
                Err(e @ EngineError::DegenerateGeometry(_)) => {
                    warn!(participant_id = %id, error = %e, "room: position solve failed");
                    failure = Some(e);
                }
                Err(e) => {
                    log_rejection(&e);
                    return Err(e);
                }
            }
        }

        // PHASE: COMMIT
        let newly_positioned = staged.position().filter(|_| !current.is_positioned());
        let join_index = staged.join_index();
        self.roster.replace(staged)?;
        if let Some(pos) = newly_positioned {
            self.positions.push(PositionRecord { participant_id: id, join_index, position: pos });
        }

        let changed = self.roster.find_by_id(id)?.view();
        info!(
            participant_id = %id,
            target_id = %target_id,
            bearing,
            calibrations = changed.calibration_count,
            "room: calibration recorded"
        );

        let mut events = vec![RoomEvent::UsersUpdated { changed: changed.clone(), users: self.users() }];
        if newly_positioned.is_some() {
            events.push(RoomEvent::PositionComputed {
                changed: changed.clone(),
                users: self.users(),
                positions: self.positions.clone(),
            });
        }
        if let Some(error) = failure {
            events.push(RoomEvent::PositionFailed { changed, error });
        }
        self.push_next(&mut events);
        Ok(events)
    }

    /// Clear every participant and the positions log.
    pub fn reset(&mut self) -> Vec<RoomEvent> {
        info!(users = self.roster.len(), "room: reset");
        self.roster.clear();
        self.positions.clear();
        vec![RoomEvent::Reset]
    }

    fn push_next(&self, events: &mut Vec<RoomEvent>) {
        if let Some(next) = self.next_calibration() {
            info!(
                participant_id = %next.participant_id,
                partner_id = %next.partner.id,
                "room: next calibration"
            );
            events.push(RoomEvent::NextCalibration(next));
        }
    }
}

fn log_rejection(e: &EngineError) {
    if e.is_out_of_turn() {
        error!(error = %e, "room: calibration submitted before its partner was ready");
    }
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
