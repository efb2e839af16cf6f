//! # State of charge curve
//!
//! Piecewise-linear lookup from battery voltage to a percentage.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use util::maths::lerp;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An immutable voltage to percentage curve.
///
/// Points are ordered by strictly decreasing voltage, with percentages non-decreasing along the
/// table.
#[derive(Debug, Clone)]
pub struct SocCurve {
    points: Vec<(f64, f64)>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SocCurveError {
    #[error("The curve needs at least 2 points, found {0}")]
    OutOfDomain(usize),

    #[error("Curve voltages must be strictly decreasing (point {0})")]
    VoltageNotDecreasing(usize),

    #[error("Curve percentages must not decrease as voltage decreases (point {0})")]
    PercentageDecreasing(usize),

    #[error("Curve point {0} is not finite")]
    NonFinite(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SocCurve {
    /// Build a curve from `(voltage, percentage)` points.
    pub fn new(points: Vec<(f64, f64)>) -> Result<Self, SocCurveError> {
        if points.len() < 2 {
            return Err(SocCurveError::OutOfDomain(points.len()));
        }

        for (i, p) in points.iter().enumerate() {
            if !p.0.is_finite() || !p.1.is_finite() {
                return Err(SocCurveError::NonFinite(i));
            }
        }

        for (i, w) in points.windows(2).enumerate() {
            if w[1].0 >= w[0].0 {
                return Err(SocCurveError::VoltageNotDecreasing(i + 1));
            }
            if w[1].1 < w[0].1 {
                return Err(SocCurveError::PercentageDecreasing(i + 1));
            }
        }

        Ok(Self { points })
    }

    /// Get the percentage for the given voltage.
    ///
    /// Voltages outside the table clamp to the percentage at that end.
    pub fn lookup(&self, voltage: f64) -> f64 {
        // Construction guarantees at least two points
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];

        if voltage >= first.0 {
            return first.1;
        }
        if voltage <= last.0 {
            return last.1;
        }

        for w in self.points.windows(2) {
            if voltage <= w[0].0 && voltage > w[1].0 {
                return lerp(w[0], w[1], voltage);
            }
        }

        // Unreachable for a strictly decreasing table
        last.1
    }
}
