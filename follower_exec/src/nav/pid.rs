//! # PID controller

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Serialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single axis PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Previous error
    prev_error: f64,

    /// The integral accumulation
    integral: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PidController {
    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p,
            k_i,
            k_d,
            prev_error: 0f64,
            integral: 0f64,
        }
    }

    /// Get the value of the controller for the given error, `dt` seconds after the previous
    /// update.
    ///
    /// A non-positive `dt` contributes nothing to the integral or derivative terms.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        let deriv = if dt > 0.0 {
            self.integral += error * dt;
            (error - self.prev_error) / dt
        } else {
            0f64
        };

        let out = self.k_p * error + self.k_i * self.integral + self.k_d * deriv;

        self.prev_error = error;

        out
    }

    /// Zero the integral accumulation.
    pub fn reset_integral(&mut self) {
        self.integral = 0f64;
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(1.0, 0.0, 0.0);
        assert_eq!(pid.update(5.0, 1.0), 5.0);
        assert_eq!(pid.update(-2.0, 1.0), -2.0);
    }

    #[test]
    fn test_integral_and_derivative() {
        let mut pid = PidController::new(0.0, 1.0, 0.0);
        assert_eq!(pid.update(2.0, 1.0), 2.0);
        assert_eq!(pid.update(2.0, 0.5), 3.0);

        let mut pid = PidController::new(0.0, 0.0, 1.0);
        assert_eq!(pid.update(2.0, 1.0), 2.0);
        assert_eq!(pid.update(3.0, 0.5), 2.0);
        assert_eq!(pid.update(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_integral_reset_gives_equal_outputs() {
        let mut pid = PidController::new(1.0, 0.5, 0.0);

        pid.reset_integral();
        let first = pid.update(5.0, 1.0);
        pid.reset_integral();
        let second = pid.update(5.0, 1.0);

        assert_eq!(first, 7.5);
        assert_eq!(first, second);

        // Without the reset the integral winds up
        let third = pid.update(5.0, 1.0);
        assert!(third > second);
        assert_eq!(pid.integral(), 10.0);
    }
}
