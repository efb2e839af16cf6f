//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the line follower software: telecommands
//! between the operator console and the executive, payloads for the actuator controller and the
//! camera server, and the networking layer they travel over.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands and their responses
pub mod tc;

/// Command and response definitions for equipment (actuator controller, camera)
pub mod eqpt;

/// Network module
pub mod net;
