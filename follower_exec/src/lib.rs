//! # Line follower library.
//!
//! This library allows other crates in the workspace (and the benchmarks) to access items defined
//! inside the executive.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator client - sends navigation commands and colour triggers to the actuator controller
pub mod actuator_client;

/// Camera client - requests frames from the camera server
pub mod cam_client;

/// Colour detection - tells the actuator controller when the target colour is in view
pub mod colour;

/// Navigation - follows the line
pub mod nav;

/// Executive parameters
pub mod params;

/// Power monitoring - battery state of charge estimation
pub mod power;

/// State shared between tasks
pub mod shared;

/// Periodic task runner
pub mod task;

/// Telecommand processor - executes TCs against the shared state
pub mod tc_processor;

/// Telecommand server - recieves TCs from the operator console
pub mod tc_server;

#[cfg(test)]
pub(crate) mod fakes;
