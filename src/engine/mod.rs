//! Triangulation engine — bearings in, grid positions out.
//!
//! ARCHITECTURE
//! ============
//! The engine is pure and synchronous. It owns no sockets, no locks and no
//! clocks: the websocket layer serializes requests against one `Room` and
//! translates the returned `RoomEvent`s into frames.
//!
//! ```text
//! angle ── roster ── sequencer ──┐
//!   │                            ├── room (aggregate)
//!   └── anchor ── position ──────┘
//! ```
//!
//! GRID CONVENTION
//! ===============
//! Grid bearing 0° points from the reference participant (join index 0)
//! toward join index 1, i.e. along +y. Positive bearings turn toward +x. A
//! grid bearing `θ` is therefore the direction `(sin θ, cos θ)`.

pub mod anchor;
pub mod angle;
pub mod participant;
pub mod pointing;
pub mod position;
pub mod room;
pub mod roster;
pub mod sequencer;

use uuid::Uuid;

pub use participant::{Calibration, Participant, ParticipantView, Position, Profile};
pub use room::{GridConfig, PositionRecord, Room, RoomEvent};
pub use sequencer::NextCalibration;

// =============================================================================
// ERROR TYPE
// =============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("invalid angle: {0}")]
    InvalidAngle(f64),
    #[error("participant not found: {0}")]
    NotFound(Uuid),
    #[error("participant already joined: {0}")]
    DuplicateParticipant(Uuid),
    #[error("participant {0} cannot calibrate against itself")]
    SelfCalibration(Uuid),
    #[error("participant {0} has already completed its calibrations")]
    AlreadyCalibrated(Uuid),
    #[error("participant {participant} must calibrate toward join index {expected:?}, not {target}")]
    UnexpectedTarget { participant: Uuid, target: Uuid, expected: Option<u32> },
    #[error("anchor not ready: participant {0} has no grid angle yet")]
    AnchorNotReady(Uuid),
    #[error("predecessor of join index {0} is not positioned")]
    PredecessorNotPositioned(u32),
    #[error("degenerate geometry for join index {0}: bearings are collinear")]
    DegenerateGeometry(u32),
}

impl EngineError {
    /// Calibrations that arrive before the peer they depend on is ready.
    #[must_use]
    pub fn is_out_of_turn(&self) -> bool {
        matches!(self, Self::AnchorNotReady(_) | Self::PredecessorNotPositioned(_))
    }
}

impl crate::frame::ErrorCode for EngineError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAngle(_) => "E_INVALID_ANGLE",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::DuplicateParticipant(_) => "E_DUPLICATE_PARTICIPANT",
            Self::SelfCalibration(_) => "E_SELF_CALIBRATION",
            Self::AlreadyCalibrated(_) => "E_ALREADY_CALIBRATED",
            Self::UnexpectedTarget { .. } => "E_UNEXPECTED_TARGET",
            Self::AnchorNotReady(_) => "E_ANCHOR_NOT_READY",
            Self::PredecessorNotPositioned(_) => "E_PREDECESSOR_NOT_POSITIONED",
            Self::DegenerateGeometry(_) => "E_DEGENERATE_GEOMETRY",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::DegenerateGeometry(_))
    }
}
