// Motor control module for the L9110 servo/DC motor board
//
// Provides:
// - The 5-byte I2C command protocol (frames, range mapping, checksum)
// - Bus transports (embedded-hal adapter, Linux i2c-dev, dry-run)
// - High-level driver API

pub mod bus;
mod driver;
pub mod protocol;

pub use bus::{Bus, HalBus, LogBus};
pub use driver::L9110;
pub use protocol::{
    CommandFrame, Direction, DriverError, ErrorKind, Mode, MotorChannel, ServoChannel,
};
