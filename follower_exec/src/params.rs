//! # Executive Parameters
//!
//! Parameters for the executive itself, loaded from `follower_exec.toml`. Module parameters live
//! in their own files.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::net::NetParams;
use serde::Deserialize;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    /// Network endpoints
    pub net: NetParams,

    /// Period of the navigation task
    pub nav_period_s: f64,

    /// Period of the colour detection task
    pub colour_period_s: f64,

    /// Period of the power monitoring task
    pub power_period_s: f64,

    /// Send and receive timeout for requests to the actuator controller
    pub actuator_timeout_ms: i32,

    /// Receive timeout for frames from the camera server
    pub cam_timeout_ms: i32,

    /// File holding the accumulated battery charge, relative to the software root
    pub charge_file: String,

    /// Use the simulated ADC even when the real one is available
    #[serde(default)]
    pub sim_adc: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExecParamsError {
    #[error("The {0} task period must be positive, found {1} s")]
    InvalidPeriod(&'static str, f64),

    #[error("The {0} timeout must be positive, found {1} ms")]
    InvalidTimeout(&'static str, i32),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ExecParams {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ExecParamsError> {
        for &(name, period) in [
            ("navigation", self.nav_period_s),
            ("colour", self.colour_period_s),
            ("power", self.power_period_s),
        ]
        .iter()
        {
            if !(period > 0.0 && period.is_finite()) {
                return Err(ExecParamsError::InvalidPeriod(name, period));
            }
        }

        for &(name, timeout) in [
            ("actuator", self.actuator_timeout_ms),
            ("camera", self.cam_timeout_ms),
        ]
        .iter()
        {
            if timeout <= 0 {
                return Err(ExecParamsError::InvalidTimeout(name, timeout));
            }
        }

        Ok(())
    }
}
