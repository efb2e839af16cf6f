//! # Actuator Controller Interface
//!
//! Requests sent by the executive to the actuator controller. There is exactly one request per
//! navigation tick, plus one colour trigger per colour detection tick while a colour is armed.
//!
//! The navigation payload is a tagged value, so "no line" and "stop" can never be confused with a
//! legitimate small offset:
//!
//! ```text
//! {"Nav":{"cmd":"Move","x":12.5,"y":-1.2}}
//! {"Nav":{"cmd":"Stop"}}
//! {"Nav":{"cmd":"NoLine"}}
//! {"Colour":{"found":true}}
//! ```

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The navigation command produced by each navigation tick.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "cmd")]
pub enum NavCmd {
    /// Steer to correct the lateral (`x`) and heading (`y`) offsets, in actuator units.
    Move { x: f64, y: f64 },

    /// The line is under the rover, lateral error negligible.
    Stop,

    /// No line is visible in the frame.
    NoLine,
}

/// A request to the actuator controller.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum ActuatorRequest {
    Nav(NavCmd),

    Colour(ColourTrigger),
}

/// Response from the actuator controller.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub enum ActuatorResponse {
    /// The request was accepted
    Ok,

    /// The request was rejected
    Invalid,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Whether the armed target colour was found in the latest frame.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColourTrigger {
    pub found: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_nav_cmd_payload() {
        assert_eq!(
            serde_json::to_string(&ActuatorRequest::Nav(NavCmd::Stop)).unwrap(),
            r#"{"Nav":{"cmd":"Stop"}}"#
        );
        assert_eq!(
            serde_json::to_string(&NavCmd::Move { x: -1.0, y: 0.0 }).unwrap(),
            r#"{"cmd":"Move","x":-1.0,"y":0.0}"#
        );
        assert_eq!(
            serde_json::to_string(&ActuatorRequest::Colour(ColourTrigger { found: true }))
                .unwrap(),
            r#"{"Colour":{"found":true}}"#
        );
    }
}
