//! # Navigation control parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for NavCtrl, loaded from `nav_ctrl.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- CONTROLLERS ----
    pub rho_k_p: f64,
    pub rho_k_i: f64,
    pub rho_k_d: f64,

    pub theta_k_p: f64,
    pub theta_k_i: f64,
    pub theta_k_d: f64,

    /// Time step passed to the controllers each cycle
    pub ctrl_dt_s: f64,

    // ---- LINE DETECTION ----
    /// Pixels with a grayscale value below this are line
    pub binarise_threshold: u8,

    /// Lateral error at or below which the rover stops, in pixels
    pub stop_threshold_px: f64,

    // ---- OUTPUT TRANSFORM ----
    /// `x = (rho_out + x_offset) * x_scale`
    pub x_offset: f64,
    pub x_scale: f64,

    /// `y = theta_out * y_scale + y_offset`
    pub y_scale: f64,
    pub y_offset: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("The controller time step must be positive, found {0}")]
    InvalidDt(f64),

    #[error("The stop threshold must not be negative, found {0}")]
    NegativeStopThreshold(f64),

    #[error("{0} is not finite")]
    NonFinite(&'static str),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Params {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        for &(name, value) in [
            ("rho_k_p", self.rho_k_p),
            ("rho_k_i", self.rho_k_i),
            ("rho_k_d", self.rho_k_d),
            ("theta_k_p", self.theta_k_p),
            ("theta_k_i", self.theta_k_i),
            ("theta_k_d", self.theta_k_d),
            ("x_offset", self.x_offset),
            ("x_scale", self.x_scale),
            ("y_scale", self.y_scale),
            ("y_offset", self.y_offset),
        ]
        .iter()
        {
            if !value.is_finite() {
                return Err(ParamsError::NonFinite(name));
            }
        }

        if !(self.ctrl_dt_s > 0.0) {
            return Err(ParamsError::InvalidDt(self.ctrl_dt_s));
        }

        if !(self.stop_threshold_px >= 0.0) {
            return Err(ParamsError::NegativeStopThreshold(self.stop_threshold_px));
        }

        Ok(())
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            rho_k_p: 1.1,
            rho_k_i: 0.6,
            rho_k_d: 0.08,
            theta_k_p: 0.001,
            theta_k_i: 0.1,
            theta_k_d: 0.01,
            ctrl_dt_s: 1.0,
            binarise_threshold: 60,
            stop_threshold_px: 4.0,
            x_offset: 20.0,
            x_scale: 10.0,
            y_scale: 10.0,
            y_offset: -1.6,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_param_file() {
        let p: Params =
            util::params::from_str(include_str!("../../../params/nav_ctrl.toml")).unwrap();
        let d = Params::default();

        assert!(p.are_valid().is_ok());
        assert_eq!(p.binarise_threshold, d.binarise_threshold);
        assert!((p.rho_k_p - d.rho_k_p).abs() < 1e-12);
        assert!((p.y_offset - d.y_offset).abs() < 1e-12);
    }

    #[test]
    fn test_invalid() {
        let mut p = Params::default();
        p.ctrl_dt_s = 0.0;
        assert!(matches!(p.are_valid(), Err(ParamsError::InvalidDt(_))));

        let mut p = Params::default();
        p.theta_k_i = std::f64::NAN;
        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::NonFinite("theta_k_i"))
        ));
    }
}
