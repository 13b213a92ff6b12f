//! Position solver — places an anchored participant on the grid.
//!
//! DESIGN
//! ======
//! Join index 0 sits at the origin and join index 1 at `(0, L)`. Every later
//! participant `N` is triangulated from the reference `A` (origin) and its
//! predecessor `M` (join index `n - 1`, already placed):
//!
//! ```text
//!        M (mx, my)
//!         \
//!          \  mn_grid
//!           \
//!            N
//!           /
//!          /  an_grid
//!         /
//!        A (0, 0)
//! ```
//!
//! The bearing A→N is the opposite of N's own first bearing (toward A); the
//! bearing M→N is M's latest bearing. Each bearing is split into a quadrant
//! sign and the absolute sine/cosine of the triangle's interior angle, and
//! the two rays are intersected directly.
//!
//! The line equations are solved in cross-multiplied form so the only
//! division is by the determinant of the two directions. That determinant
//! is the sine of the angle between the rays; when it is within
//! `DEGENERATE_EPSILON` of zero the triangle is collinear and there is no
//! unique answer.

use super::EngineError;
use super::angle::{local_to_grid, opposite_grid_bearing, to_radians};
use super::participant::{Participant, Position};
use super::roster::Roster;

/// Floor for `|sin|` of the angle at A, for bearings of exactly 0° or 180°.
pub const SIN_FLOOR: f64 = 1e-9;

/// Below this the two rays are treated as parallel.
pub const DEGENERATE_EPSILON: f64 = 1e-6;

/// Compute the grid position of `candidate`, which already carries the
/// calibration that made it positionable and its angle to the grid.
///
/// # Errors
///
/// - `AnchorNotReady` if `candidate` has no grid angle or no calibration.
/// - `PredecessorNotPositioned` if join index `n - 1` is missing, unplaced,
///   unanchored, or its latest bearing is not toward `candidate`.
/// - `DegenerateGeometry` if the bearings are collinear.
pub fn solve(candidate: &Participant, roster: &Roster, reference_length: f64) -> Result<Position, EngineError> {
    match candidate.join_index() {
        0 => Ok(Position::ORIGIN),
        1 => Ok(Position::new(0.0, reference_length)),
        n => triangulate(candidate, n, roster),
    }
}

fn triangulate(candidate: &Participant, n: u32, roster: &Roster) -> Result<Position, EngineError> {
    let not_ready = EngineError::AnchorNotReady(candidate.id());
    let angle_to_grid = candidate.angle_to_grid().ok_or_else(|| not_ready.clone())?;
    let to_reference = candidate.first_calibration().ok_or(not_ready)?;

    let predecessor = roster
        .find_by_index(n - 1)
        .ok_or(EngineError::PredecessorNotPositioned(n))?;
    let (Some(m), Some(m_angle), Some(m_last)) =
        (predecessor.position(), predecessor.angle_to_grid(), predecessor.last_calibration())
    else {
        return Err(EngineError::PredecessorNotPositioned(n));
    };
    if m_last.target_id != candidate.id() {
        return Err(EngineError::PredecessorNotPositioned(n));
    }

    let na_grid = local_to_grid(to_reference.bearing, angle_to_grid);
    let an_grid = opposite_grid_bearing(na_grid);
    let mn_grid = local_to_grid(m_last.bearing, m_angle);
    let nm_grid = opposite_grid_bearing(mn_grid);

    let an = Ray::new(an_grid, na_grid);
    let mn = Ray::new(mn_grid, nm_grid);
    let sin_an = an.sin.max(SIN_FLOOR);

    // A + t·(ax·sin_an, ay·cos_an) = M + s·(mx·sin_mn, my·cos_mn), A at origin.
    let det = mn.x_sign * mn.sin * an.y_sign * an.cos - mn.y_sign * mn.cos * an.x_sign * sin_an;
    if det.abs() < DEGENERATE_EPSILON {
        return Err(EngineError::DegenerateGeometry(n));
    }
    let length_mn = (m.y * an.x_sign * sin_an - m.x * an.y_sign * an.cos) / det;

    let x = m.x + mn.x_sign * length_mn * mn.sin;
    let y = m.y + mn.y_sign * length_mn * mn.cos;
    if !x.is_finite() || !y.is_finite() {
        return Err(EngineError::DegenerateGeometry(n));
    }
    Ok(Position::new(x, y))
}

/// A grid bearing split into quadrant signs and interior-angle magnitudes.
struct Ray {
    /// +1 when the bearing points toward +x.
    x_sign: f64,
    /// +1 when the bearing is within ±90°, i.e. toward +y.
    y_sign: f64,
    sin: f64,
    cos: f64,
}

impl Ray {
    fn new(bearing: f64, opposite: f64) -> Self {
        let interior = to_radians(bearing.abs().min(opposite.abs()));
        Self {
            x_sign: if bearing > 0.0 { 1.0 } else { -1.0 },
            y_sign: if bearing.abs() < 90.0 { 1.0 } else { -1.0 },
            sin: interior.sin().abs(),
            cos: interior.cos().abs(),
        }
    }
}

#[cfg(test)]
#[path = "position_test.rs"]
mod tests;
