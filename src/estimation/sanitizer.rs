//! Physical bounds check for bandwidth estimates.

use super::EstimationError;

/// Keep an estimate only if `0 < abw < phy_cap`.
///
/// Both values must share a unit (bytes/s in this crate). NaN never passes.
pub fn sanitize(abw: f64, phy_cap: f64) -> Result<f64, EstimationError> {
    if abw > 0.0 && abw < phy_cap {
        Ok(abw)
    } else {
        Err(EstimationError::OutOfBounds {
            estimate: abw,
            capacity: phy_cap,
        })
    }
}
