//! Implementations for the NavCtrl state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use comms_if::eqpt::actuator::NavCmd;
use image::RgbImage;
use log::{info, trace};
use serde::Serialize;

// Internal
use super::{
    line_error::{self, LineError},
    params::{Params, ParamsError},
    pid::PidController,
};
use util::{module::State, params};

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// Navigation control module state
#[derive(Debug, Clone)]
pub struct NavCtrl {
    params: Params,

    rho_pid: PidController,

    theta_pid: PidController,

    state: NavState,
}

/// Input data to navigation control
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// Error of the line in the latest frame
    pub line_error: LineError,
}

/// Status report for NavCtrl processing.
///
/// Also the record archived each navigation cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct StatusReport {
    /// Seconds since the session epoch
    pub time_s: f64,

    pub state: NavState,

    pub rho_err: f64,
    pub theta_err: f64,

    /// Controller outputs, zero unless tracking
    pub rho_out: f64,
    pub theta_out: f64,
}

/// The navigation state, driven only by whether the line is found and how far off centre it is.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum NavState {
    /// No line in view
    Searching,

    /// Steering to follow the line
    Tracking,

    /// Line is centred, rover stopped
    Stopping,
}

#[derive(Debug, thiserror::Error)]
pub enum NavCtrlError {
    #[error("Could not load the parameters: {0}")]
    ParamLoadError(params::LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(ParamsError),

    #[error("The line error is not finite (rho = {0}, theta = {1})")]
    NonFiniteError(f64, f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl NavCtrl {
    /// Create a new instance from the given parameters.
    pub fn new(params: Params) -> Result<Self, NavCtrlError> {
        params.are_valid().map_err(NavCtrlError::InvalidParams)?;

        Ok(Self::from_valid_params(params))
    }

    /// Binarise the frame and extract the line error from it.
    pub fn line_error(&self, frame: &RgbImage) -> LineError {
        line_error::extract(&line_error::binarise(
            frame,
            self.params.binarise_threshold,
        ))
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    fn from_valid_params(params: Params) -> Self {
        Self {
            rho_pid: PidController::new(params.rho_k_p, params.rho_k_i, params.rho_k_d),
            theta_pid: PidController::new(params.theta_k_p, params.theta_k_i, params.theta_k_d),
            params,
            state: NavState::Searching,
        }
    }

    fn set_state(&mut self, state: NavState) {
        if state != self.state {
            info!("NavCtrl: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

impl Default for NavCtrl {
    fn default() -> Self {
        Self::from_valid_params(Params::default())
    }
}

impl Default for NavState {
    fn default() -> Self {
        NavState::Searching
    }
}

impl State for NavCtrl {
    type InitData = &'static str;
    type InitError = NavCtrlError;

    type InputData = InputData;
    type OutputData = NavCmd;
    type StatusReport = StatusReport;
    type ProcError = NavCtrlError;

    /// Initialise the NavCtrl module.
    ///
    /// Expected init data is the path to the parameter file
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let params: Params = params::load(init_data).map_err(NavCtrlError::ParamLoadError)?;

        *self = Self::new(params)?;

        Ok(())
    }

    /// Decide the navigation command for the latest line error.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let err = input_data.line_error;

        let mut report = StatusReport {
            time_s: util::session::get_elapsed_seconds(),
            rho_err: err.rho_err,
            theta_err: err.theta_err,
            ..Default::default()
        };

        if !err.found {
            self.set_state(NavState::Searching);
            report.state = self.state;
            return Ok((NavCmd::NoLine, report));
        }

        if !err.rho_err.is_finite() || !err.theta_err.is_finite() {
            return Err(NavCtrlError::NonFiniteError(err.rho_err, err.theta_err));
        }

        if err.rho_err.abs() <= self.params.stop_threshold_px {
            self.set_state(NavState::Stopping);
            report.state = self.state;
            return Ok((NavCmd::Stop, report));
        }

        self.set_state(NavState::Tracking);

        // Integrals only ever hold the current cycle's error
        self.rho_pid.reset_integral();
        self.theta_pid.reset_integral();

        let dt = self.params.ctrl_dt_s;
        report.rho_out = self.rho_pid.update(err.rho_err, dt);
        report.theta_out = self.theta_pid.update(err.theta_err, dt);
        report.state = self.state;

        let p = &self.params;
        let cmd = NavCmd::Move {
            x: (report.rho_out + p.x_offset) * p.x_scale,
            y: report.theta_out * p.y_scale + p.y_offset,
        };

        trace!("NavCtrl output: {:?}", cmd);

        Ok((cmd, report))
    }
}
