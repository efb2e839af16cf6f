//! # Voltage sources
//!
//! The power estimator reads its measurements through the [`VoltageSource`] trait. On the rover
//! this is an MCP3208 12-bit ADC on the Raspberry Pi's SPI bus; elsewhere a simulated source
//! returning fixed voltages stands in.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

#[cfg(target_arch = "arm")]
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of input channels on the ADC.
pub const NUM_ADC_CHANNELS: usize = 8;

/// Full scale voltage of the ADC.
pub const MAX_ADC_V: f64 = 5.0;

/// Largest raw reading from the 12 bit ADC.
pub const ADC_MAX_RAW: u16 = 4095;

/// SPI clock speed for the ADC.
#[cfg(target_arch = "arm")]
const SPI_CLOCK_HZ: u32 = 1_000_000;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A source of voltage samples.
pub trait VoltageSource {
    /// Read the voltage on the given channel, in the range `[0, MAX_ADC_V]`.
    fn read(&mut self, channel: u8) -> Result<f64, SensorError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// MCP3208 ADC connected to SPI0 with chip select 0.
#[cfg(target_arch = "arm")]
pub struct Mcp3208 {
    spi: Spi,
}

/// A simulated ADC which returns fixed voltages.
#[derive(Debug, Clone, Default)]
pub struct SimVoltageSource {
    voltages: [f64; NUM_ADC_CHANNELS],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("ADC channel {0} is outside [0, 7]")]
    ChannelError(u8),

    #[error("Could not open the ADC: {0}")]
    OpenError(String),

    #[error("ADC bus transfer failed: {0}")]
    BusError(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

#[cfg(target_arch = "arm")]
impl Mcp3208 {
    /// Open the ADC.
    pub fn new() -> Result<Self, SensorError> {
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| SensorError::OpenError(e.to_string()))?;

        Ok(Self { spi })
    }
}

#[cfg(target_arch = "arm")]
impl VoltageSource for Mcp3208 {
    fn read(&mut self, channel: u8) -> Result<f64, SensorError> {
        let request = request_bytes(channel)?;
        let mut response = [0u8; 3];

        self.spi
            .transfer(&mut response, &request)
            .map_err(|e| SensorError::BusError(e.to_string()))?;

        Ok(raw_to_volts(parse_response(&response)))
    }
}

impl SimVoltageSource {
    /// Create a simulated source from per-channel voltages. Missing channels read 0 V, extra
    /// values are ignored.
    pub fn new(voltages: &[f64]) -> Self {
        let mut v = [0f64; NUM_ADC_CHANNELS];
        for (dst, src) in v.iter_mut().zip(voltages.iter()) {
            *dst = src.max(0.0).min(MAX_ADC_V);
        }

        Self { voltages: v }
    }

    /// Change the voltage on a channel.
    pub fn set(&mut self, channel: u8, voltage: f64) -> Result<(), SensorError> {
        check_channel(channel)?;
        self.voltages[channel as usize] = voltage.max(0.0).min(MAX_ADC_V);
        Ok(())
    }
}

impl VoltageSource for SimVoltageSource {
    fn read(&mut self, channel: u8) -> Result<f64, SensorError> {
        check_channel(channel)?;

        // Quantise as the real ADC would
        let raw = (self.voltages[channel as usize] / MAX_ADC_V * ADC_MAX_RAW as f64).round();
        Ok(raw_to_volts(raw as u16))
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Return an error if the channel does not exist on the ADC.
pub fn check_channel(channel: u8) -> Result<(), SensorError> {
    if channel as usize >= NUM_ADC_CHANNELS {
        Err(SensorError::ChannelError(channel))
    } else {
        Ok(())
    }
}

/// Build the 3 byte single-ended conversion request for a channel.
pub fn request_bytes(channel: u8) -> Result<[u8; 3], SensorError> {
    check_channel(channel)?;

    Ok([0x06 | ((channel & 4) >> 2), (channel & 3) << 6, 0x00])
}

/// Extract the 12 bit reading from the ADC's response.
pub fn parse_response(rx: &[u8; 3]) -> u16 {
    (((rx[1] & 0x0F) as u16) << 8) | rx[2] as u16
}

/// Convert a raw reading into Volts.
pub fn raw_to_volts(raw: u16) -> f64 {
    util::maths::lin_map(
        (0.0, ADC_MAX_RAW as f64),
        (0.0, MAX_ADC_V),
        raw.min(ADC_MAX_RAW) as f64,
    )
}
