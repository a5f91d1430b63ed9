// High-level driver for the L9110 servo/motor board
//
// Validates commands against the configured ranges, encodes them with the
// protocol module and writes them through a Bus.

use tracing::{debug, info, warn};

use super::bus::Bus;
use super::protocol::{
    map_range, percent_to_speed, CommandFrame, Direction, DriverError, MotorChannel, Result,
    ServoChannel,
};
use crate::config::{self, DeviceConfig};

/// Driver for one L9110 board on an I2C bus
///
/// The driver owns its bus and its configuration. Callers sharing it between
/// threads must wrap it in a mutex.
pub struct L9110<B: Bus> {
    bus: Option<B>,
    config: DeviceConfig,
}

impl<B: Bus> L9110<B> {
    /// Create a driver with the default address (0x40) and ranges
    pub fn new(bus: B) -> Self {
        info!("L9110 driver ready at 0x{:02X}", config::DEFAULT_ADDRESS);
        Self {
            bus: Some(bus),
            config: DeviceConfig::default(),
        }
    }

    /// Create a driver with a custom configuration
    pub fn with_config(bus: B, config: DeviceConfig) -> Result<Self> {
        if !config::address_in_window(config.address) {
            return Err(DriverError::AddressOutOfRange(config.address));
        }
        if !config::degree_range_valid(config.min_degree, config.max_degree) {
            return Err(DriverError::InvalidDegreeRange {
                min: config.min_degree,
                max: config.max_degree,
            });
        }
        if !config::pulse_range_valid(config.min_pulse, config.max_pulse) {
            return Err(DriverError::InvalidPulseRange {
                min: config.min_pulse,
                max: config.max_pulse,
            });
        }
        info!("L9110 driver ready at 0x{:02X}", config.address);
        Ok(Self {
            bus: Some(bus),
            config,
        })
    }

    /// Current I2C address of the device
    pub fn address(&self) -> u8 {
        self.config.address
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn degree_range(&self) -> (i32, i32) {
        (self.config.min_degree, self.config.max_degree)
    }

    pub fn pulse_range(&self) -> (i32, i32) {
        (self.config.min_pulse, self.config.max_pulse)
    }

    /// Set the servo angle range (0 <= min < max <= 360)
    pub fn set_degree_range(&mut self, min: i32, max: i32) -> Result<()> {
        if !config::degree_range_valid(min, max) {
            warn!("Rejected degree range {}-{}", min, max);
            return Err(DriverError::InvalidDegreeRange { min, max });
        }
        self.config.min_degree = min;
        self.config.max_degree = max;
        Ok(())
    }

    /// Set the servo pulse width range (0 <= min < max <= 2815)
    pub fn set_pulse_range(&mut self, min: i32, max: i32) -> Result<()> {
        if !config::pulse_range_valid(min, max) {
            warn!("Rejected pulse range {}-{}", min, max);
            return Err(DriverError::InvalidPulseRange { min, max });
        }
        self.config.min_pulse = min;
        self.config.max_pulse = max;
        Ok(())
    }

    /// Validate a servo angle and encode it without sending
    pub fn encode_servo(&self, channel: ServoChannel, degree: i32) -> Result<CommandFrame> {
        let c = &self.config;
        if !(c.min_degree..=c.max_degree).contains(&degree) {
            return Err(DriverError::DegreeOutOfRange {
                degree,
                min: c.min_degree,
                max: c.max_degree,
            });
        }

        // In range, so the pulse lies within [min_pulse, max_pulse] <= 2815
        let pulse = map_range(
            degree,
            c.min_degree,
            c.max_degree,
            c.min_pulse,
            c.max_pulse,
        );
        Ok(CommandFrame::servo(channel, pulse as u16))
    }

    /// Validate a motor command and encode it without sending
    pub fn encode_motor(
        &self,
        channel: MotorChannel,
        percent: i32,
        direction: Direction,
    ) -> Result<CommandFrame> {
        let speed = percent_to_speed(percent)?;
        Ok(CommandFrame::motor(channel, speed, direction))
    }

    /// Move a servo to `degree` within the configured degree range
    pub fn control_servo(&mut self, channel: ServoChannel, degree: i32) -> Result<()> {
        let frame = self.encode_servo(channel, degree).inspect_err(|e| warn!("{}", e))?;
        debug!("Servo {:?} -> {} deg", channel, degree);
        self.transmit(&frame)
    }

    /// Run a DC motor at `percent` (0-100) of full speed
    pub fn control_motor(
        &mut self,
        channel: MotorChannel,
        percent: i32,
        direction: Direction,
    ) -> Result<()> {
        let frame = self
            .encode_motor(channel, percent, direction)
            .inspect_err(|e| warn!("{}", e))?;
        debug!("Motor {:?} -> {}% {:?}", channel, percent, direction);
        self.transmit(&frame)
    }

    /// Stop a DC motor
    pub fn stop_motor(&mut self, channel: MotorChannel) -> Result<()> {
        self.control_motor(channel, 0, Direction::Cw)
    }

    /// Change the device's I2C address (0x40-0x44)
    ///
    /// The command goes to the current address. The stored address only
    /// changes once the write has succeeded.
    pub fn set_address(&mut self, new_address: u8) -> Result<()> {
        if !config::address_in_window(new_address) {
            warn!("Rejected new address 0x{:02X}", new_address);
            return Err(DriverError::AddressOutOfRange(new_address));
        }

        let frame = CommandFrame::set_address(new_address);
        self.transmit(&frame)?;

        self.config.address = new_address;
        info!("Set address successful. New address: 0x{:02X}", new_address);
        Ok(())
    }

    /// Write a frame: register = frame[0], data = frame[1..5]
    pub fn transmit(&mut self, frame: &CommandFrame) -> Result<()> {
        let address = self.config.address;
        let bus = self.bus.as_mut().ok_or(DriverError::BusClosed)?;

        debug!("Write to 0x{:02X}: {}", address, frame);
        bus.write_block(address, frame.register(), frame.payload())
            .map_err(|source| {
                warn!("I2C error at 0x{:02X}: {}", address, source);
                DriverError::Bus { address, source }
            })
    }

    /// Whether the bus is still held by the driver
    pub fn is_open(&self) -> bool {
        self.bus.is_some()
    }

    /// Release the bus. Safe to call more than once.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut bus) = self.bus.take() else {
            return Ok(());
        };
        info!("Closing I2C bus for 0x{:02X}", self.config.address);
        bus.close().map_err(|source| DriverError::Bus {
            address: self.config.address,
            source,
        })
    }

    /// Hand the bus back without closing it
    pub fn release(mut self) -> Option<B> {
        self.bus.take()
    }
}

impl<B: Bus> Drop for L9110<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close I2C bus on drop: {}", e);
        }
    }
}
