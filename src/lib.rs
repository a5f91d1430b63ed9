//! Driver for the L9110 servo/DC motor controller on I2C.
//!
//! Commands are encoded into 5-byte frames and written to the device through
//! any [`motor::Bus`]; on Linux, `motor::bus::linux::open_bus` opens `/dev/i2c-N`.

pub mod config;
pub mod motor;

pub use config::DeviceConfig;
pub use motor::{Direction, DriverError, L9110, MotorChannel, ServoChannel};
