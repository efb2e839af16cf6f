//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications interface. Telecommands
//! are sent by the operator console to the executive, which answers each one with a
//! [`TcResponse`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use structopt::StructOpt;

use crate::eqpt::power::BatteryTm;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the rover by the operator.
#[derive(Debug, Clone, Serialize, Deserialize, StructOpt, PartialEq)]
pub enum Tc {
    /// Check the executive is alive.
    #[structopt(name = "ping")]
    Heartbeat,

    /// Arm colour detection for the given target colour.
    #[structopt(name = "colour")]
    SetTargetColour(ColourArgs),

    /// Disarm colour detection.
    #[structopt(name = "nocolour")]
    ClearTargetColour,

    /// Get the latest battery telemetry.
    #[structopt(name = "battery")]
    QueryBattery,

    /// Reset the battery charge accumulator.
    #[structopt(name = "reset")]
    ResetBattery(BatteryResetArgs),
}

/// The response from the executive to a telecommand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TcResponse {
    /// The TC was accepted.
    Ok,

    /// The TC could not be parsed.
    Invalid,

    /// The TC was valid but could not be executed right now.
    CannotExecute,

    /// Battery telemetry in response to `QueryBattery`.
    Battery(BatteryTm),

    /// No battery telemetry has been produced yet.
    Unavailable,
}

/// Colours which the colour detection task can look for.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Colour {
    Red,
    Yellow,
    Blue,
    Green,
    Purple,
}

/// The way in which the battery charge accumulator is reset.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BatteryReset {
    /// Battery has just been fully charged, zero the discharged charge.
    ToFull,

    /// Estimate the discharged charge from the battery voltage.
    BasedOnVoltage,
}

/// Errors parsing a colour or reset kind from the console.
#[derive(Debug, thiserror::Error)]
pub enum TcParseError {
    #[error("Unknown colour \"{0}\", expected one of red, yellow, blue, green, purple")]
    UnknownColour(String),

    #[error("Unknown reset \"{0}\", expected \"full\" or \"voltage\"")]
    UnknownReset(String),

    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Arguments for the `SetTargetColour` TC.
#[derive(Debug, Clone, Serialize, Deserialize, StructOpt, PartialEq)]
pub struct ColourArgs {
    /// One of red, yellow, blue, green, purple
    pub colour: Colour,
}

/// Arguments for the `ResetBattery` TC.
#[derive(Debug, Clone, Serialize, Deserialize, StructOpt, PartialEq)]
pub struct BatteryResetArgs {
    /// Either "full" or "voltage"
    pub reset: BatteryReset,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Tc {
    /// Parse a TC from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }
}

impl std::str::FromStr for Colour {
    type Err = TcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" => Ok(Colour::Red),
            "yellow" => Ok(Colour::Yellow),
            "blue" => Ok(Colour::Blue),
            "green" => Ok(Colour::Green),
            "purple" => Ok(Colour::Purple),
            _ => Err(TcParseError::UnknownColour(s.into())),
        }
    }
}

impl std::str::FromStr for BatteryReset {
    type Err = TcParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "reset_to_full" => Ok(BatteryReset::ToFull),
            "voltage" | "reset_based_on_voltage" => Ok(BatteryReset::BasedOnVoltage),
            _ => Err(TcParseError::UnknownReset(s.into())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tc_json() {
        let tc = Tc::ResetBattery(BatteryResetArgs {
            reset: BatteryReset::BasedOnVoltage,
        });
        let json = serde_json::to_string(&tc).unwrap();

        assert_eq!(json, r#"{"ResetBattery":{"reset":"based_on_voltage"}}"#);
        assert_eq!(Tc::from_json(&json).unwrap(), tc);
        assert!(Tc::from_json("{\"Launch\":null}").is_err());
    }

    #[test]
    fn test_console_parse() {
        let tc = Tc::from_iter_safe(vec!["tc", "colour", "Purple"]).unwrap();
        assert_eq!(
            tc,
            Tc::SetTargetColour(ColourArgs {
                colour: Colour::Purple
            })
        );

        assert!(Tc::from_iter_safe(vec!["tc", "colour", "orange"]).is_err());
        assert_eq!(
            Tc::from_iter_safe(vec!["tc", "battery"]).unwrap(),
            Tc::QueryBattery
        );
    }
}
