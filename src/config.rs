// Device constants and driver configuration
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

// I2C addresses the device can be configured to
pub const DEFAULT_ADDRESS: u8 = 0x40;
pub const MIN_ADDRESS: u8 = 0x40;
pub const MAX_ADDRESS: u8 = 0x44;

// Servo angle bounds (degrees)
pub const DEFAULT_MIN_DEGREE: i32 = 0;
pub const DEFAULT_MAX_DEGREE: i32 = 180;
pub const DEGREE_CEILING: i32 = 360;

// Servo pulse width bounds (microseconds)
pub const DEFAULT_MIN_PULSE: i32 = 500;
pub const DEFAULT_MAX_PULSE: i32 = 2500;
pub const PULSE_CEILING: i32 = 2815; // firmware limit

// Motor speed is given in percent and sent as a full byte
pub const MAX_PERCENT: i32 = 100;
pub const MAX_SPEED_BYTE: i32 = 255;

// Linux I2C adapter
pub const DEFAULT_BUS_NUMBER: u8 = 1;

/// Path of the character device for an I2C adapter number
pub fn bus_path(bus_number: u8) -> String {
    format!("/dev/i2c-{}", bus_number)
}

/// Error loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Address and servo ranges of one device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub address: u8,
    pub min_degree: i32,
    pub max_degree: i32,
    pub min_pulse: i32,
    pub max_pulse: i32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
            min_degree: DEFAULT_MIN_DEGREE,
            max_degree: DEFAULT_MAX_DEGREE,
            min_pulse: DEFAULT_MIN_PULSE,
            max_pulse: DEFAULT_MAX_PULSE,
        }
    }
}

impl DeviceConfig {
    /// Default config talking to another address
    pub fn with_address(address: u8) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the range and address invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !address_in_window(self.address) {
            return Err(ConfigError::Invalid(format!(
                "address 0x{:02X} outside 0x{:02X}-0x{:02X}",
                self.address, MIN_ADDRESS, MAX_ADDRESS
            )));
        }
        if !degree_range_valid(self.min_degree, self.max_degree) {
            return Err(ConfigError::Invalid(format!(
                "degree range {}-{} (need 0 <= min < max <= {})",
                self.min_degree, self.max_degree, DEGREE_CEILING
            )));
        }
        if !pulse_range_valid(self.min_pulse, self.max_pulse) {
            return Err(ConfigError::Invalid(format!(
                "pulse range {}-{} (need 0 <= min < max <= {})",
                self.min_pulse, self.max_pulse, PULSE_CEILING
            )));
        }
        Ok(())
    }
}

pub fn address_in_window(address: u8) -> bool {
    (MIN_ADDRESS..=MAX_ADDRESS).contains(&address)
}

pub fn degree_range_valid(min: i32, max: i32) -> bool {
    0 <= min && min < max && max <= DEGREE_CEILING
}

pub fn pulse_range_valid(min: i32, max: i32) -> bool {
    0 <= min && min < max && max <= PULSE_CEILING
}
