//! Angle math shared by the anchor and position solvers.
//!
//! All bearings are degrees. Signed angles live in `(-180, 180]`, unsigned
//! angles in `[0, 360)`. Inputs must be finite; use [`finite`] at the edge
//! of the engine to reject anything else before it reaches these helpers.

use super::EngineError;

#[cfg(test)]
#[path = "angle_test.rs"]
mod tests;

/// Reject NaN and infinities with `InvalidAngle`.
///
/// # Errors
///
/// Returns `InvalidAngle` when `a` is not finite.
pub fn finite(a: f64) -> Result<f64, EngineError> {
    if a.is_finite() { Ok(a) } else { Err(EngineError::InvalidAngle(a)) }
}

/// Wrap any finite angle into `(-180, 180]`.
#[must_use]
pub fn normalize_signed(a: f64) -> f64 {
    debug_assert!(a.is_finite(), "normalize_signed on non-finite angle");
    if a > -180.0 && a <= 180.0 {
        return a;
    }
    let wrapped = a.rem_euclid(360.0);
    if wrapped > 180.0 { wrapped - 360.0 } else { wrapped }
}

/// Wrap any finite angle into `[0, 360)`.
#[must_use]
pub fn normalize_unsigned(a: f64) -> f64 {
    debug_assert!(a.is_finite(), "normalize_unsigned on non-finite angle");
    let wrapped = a.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[must_use]
pub fn to_radians(a: f64) -> f64 {
    a.to_radians()
}

#[must_use]
pub fn to_degrees(a: f64) -> f64 {
    a.to_degrees()
}

/// Convert a bearing from a participant's local compass frame to the grid.
#[must_use]
pub fn local_to_grid(local_bearing: f64, angle_to_grid: f64) -> f64 {
    normalize_signed(local_bearing - angle_to_grid)
}

/// The grid bearing recorded from the other end of the same line.
///
/// Stays inside `(-180, 180]` for normalized input. `180` maps to `-0.0`,
/// which compares equal to `0` and maps back to `180`; an unnormalized
/// `-180` maps to `0` and does not come back, so normalize first.
#[must_use]
pub fn opposite_grid_bearing(grid_bearing: f64) -> f64 {
    let opposite = 180.0 - grid_bearing.abs();
    if grid_bearing > 0.0 { -opposite } else { opposite }
}

/// Smallest absolute difference between two bearings, in `[0, 180]`.
#[must_use]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs().rem_euclid(360.0);
    delta.min(360.0 - delta)
}
