//! # Power estimation parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

use super::{
    adc::NUM_ADC_CHANNELS,
    soc_curve::{SocCurve, SocCurveError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for the power estimator, loaded from `power_est.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// ADC channel measuring the (divided) battery voltage
    pub battery_voltage_channel: u8,

    /// ADC channel measuring the motor current sense voltage
    pub motor_current_channel: u8,

    /// ADC channel measuring the logic current sense voltage
    pub logic_current_channel: u8,

    /// ADC channel measuring the (divided) logic rail voltage
    pub logic_voltage_channel: u8,

    /// Ratio of the battery voltage divider, the ADC reading is multiplied by this
    pub battery_voltage_divider: f64,

    /// Ratio of the logic rail voltage divider
    pub logic_voltage_divider: f64,

    /// Amps per Volt of the motor current sense
    pub motor_vtoi: f64,

    /// Amps per Volt of the logic current sense
    pub logic_vtoi: f64,

    /// Resistance of the motor current shunt in Ohms
    pub shunt_resistance_ohm: f64,

    /// Efficiency of the logic rail DC-DC converter, between 0 and 1
    pub converter_efficiency: f64,

    /// Battery capacity in mAh
    pub capacity_mah: f64,

    /// Battery voltage above which a battery is considered present at startup
    pub detect_voltage_v: f64,

    /// Time between battery detection attempts at startup
    pub detect_retry_s: f64,

    /// Capacity discharged (percent) against battery voltage, voltages strictly decreasing.
    pub discharge_curve: Vec<(f64, f64)>,

    /// Voltages returned by the simulated ADC on hosts without one, indexed by channel
    #[serde(default)]
    pub sim_channel_voltages: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("ADC channel {0} does not exist")]
    InvalidChannel(u8),

    #[error("ADC channel {0} is assigned to more than one measurement")]
    DuplicateChannel(u8),

    #[error("{0} must be positive, found {1}")]
    NotPositive(&'static str, f64),

    #[error("Converter efficiency must be in (0, 1], found {0}")]
    InvalidEfficiency(f64),

    #[error("Invalid discharge curve: {0}")]
    InvalidCurve(SocCurveError),

    #[error("{0} simulated channel voltages given, expected at most {}", NUM_ADC_CHANNELS)]
    TooManySimChannels(usize),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Params {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        let channels = [
            self.battery_voltage_channel,
            self.motor_current_channel,
            self.logic_current_channel,
            self.logic_voltage_channel,
        ];

        for (i, &c) in channels.iter().enumerate() {
            if c as usize >= NUM_ADC_CHANNELS {
                return Err(ParamsError::InvalidChannel(c));
            }
            if channels[i + 1..].contains(&c) {
                return Err(ParamsError::DuplicateChannel(c));
            }
        }

        for &(name, value) in [
            ("battery_voltage_divider", self.battery_voltage_divider),
            ("logic_voltage_divider", self.logic_voltage_divider),
            ("capacity_mah", self.capacity_mah),
            ("detect_retry_s", self.detect_retry_s),
        ]
        .iter()
        {
            if !(value > 0.0) {
                return Err(ParamsError::NotPositive(name, value));
            }
        }

        if !(self.converter_efficiency > 0.0 && self.converter_efficiency <= 1.0) {
            return Err(ParamsError::InvalidEfficiency(self.converter_efficiency));
        }

        if self.sim_channel_voltages.len() > NUM_ADC_CHANNELS {
            return Err(ParamsError::TooManySimChannels(
                self.sim_channel_voltages.len(),
            ));
        }

        self.soc_curve().map(|_| ())
    }

    /// Build the discharge curve.
    pub fn soc_curve(&self) -> Result<SocCurve, ParamsError> {
        SocCurve::new(self.discharge_curve.clone()).map_err(ParamsError::InvalidCurve)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            battery_voltage_channel: 0,
            motor_current_channel: 1,
            logic_current_channel: 2,
            logic_voltage_channel: 3,
            battery_voltage_divider: 4.0,
            logic_voltage_divider: 2.0,
            motor_vtoi: 1.0,
            logic_vtoi: 1.0,
            shunt_resistance_ohm: 0.01,
            converter_efficiency: 0.93,
            capacity_mah: 2000.0,
            detect_voltage_v: 13.0,
            detect_retry_s: 1.0,
            discharge_curve: vec![
                (16.8, 0.0),
                (16.525, 2.5),
                (16.25, 5.0),
                (16.0725, 7.5),
                (15.93, 10.0),
                (15.8, 12.5),
                (15.63, 15.0),
                (15.5275, 17.5),
                (15.4, 20.0),
                (15.25, 25.0),
                (15.13, 30.0),
                (15.035, 35.0),
                (14.94, 40.0),
                (14.845, 45.0),
                (14.775, 50.0),
                (14.7275, 55.0),
                (14.68, 60.0),
                (14.6325, 65.0),
                (14.585, 70.0),
                (14.5375, 75.0),
                (14.4, 80.0),
                (14.3, 82.5),
                (14.2425, 85.0),
                (14.15, 87.5),
                (13.98, 90.0),
                (13.8, 92.5),
                (13.6, 95.0),
                (12.9975, 97.5),
                (10.0, 100.0),
            ],
            sim_channel_voltages: vec![],
        }
    }
}
