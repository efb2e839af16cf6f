//! # Power Telemetry

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Battery telemetry returned in response to a battery query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatteryTm {
    /// State of charge from Coulomb counting, in percent. Not clamped.
    pub charge_soc_percent: f64,

    /// State of charge estimated from the battery voltage, in percent.
    pub voltage_soc_percent: f64,

    /// Power drawn by the motors in Watts.
    pub motor_power_w: f64,

    /// Power drawn by the logic rail in Watts.
    pub logic_power_w: f64,

    /// Battery terminal voltage in Volts.
    pub battery_voltage_v: f64,

    /// Time at which the measurement was taken.
    pub timestamp: DateTime<Utc>,
}
