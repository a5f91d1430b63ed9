// L9110 I2C command protocol
//
// Every command is a fixed 5-byte frame:
// [Mode, Channel, DataHigh, DataLow, Checksum]
// Mode is written as the I2C register, the other four bytes as the data block.

use std::fmt;
use std::io;

use crate::config::{MAX_PERCENT, MAX_SPEED_BYTE};

/// Number of bytes in a command frame
pub const FRAME_LEN: usize = 5;

/// Command modes (first frame byte)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Rc = 0,      // servo
    Dc = 1,      // DC motor
    SetAddr = 2, // change I2C address
}

/// Servo outputs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoChannel {
    S1 = 1,
    S2 = 2,
}

/// DC motor outputs
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorChannel {
    Ma = 0,
    Mb = 1,
}

/// Motor rotation direction
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Cw = 0,
    Ccw = 1,
}

/// Which class of failure a [`DriverError`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RangeConfig,
    ParameterOutOfRange,
    AddressOutOfRange,
    Bus,
}

/// Error types for L9110 commands
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Degree range invalid: {min}-{max} (ensure 0 <= min < max <= 360)")]
    InvalidDegreeRange { min: i32, max: i32 },

    #[error("Pulse range invalid: {min}-{max} (ensure 0 <= min < max <= 2815)")]
    InvalidPulseRange { min: i32, max: i32 },

    #[error("Degree {degree} out of range ({min}-{max})")]
    DegreeOutOfRange { degree: i32, min: i32, max: i32 },

    #[error("Percent {percent} out of range (0-100)")]
    PercentOutOfRange { percent: i32 },

    #[error("Direction {0} invalid (use 0 for CW or 1 for CCW)")]
    InvalidDirection(u8),

    #[error("Servo channel {0} invalid (use 1 or 2)")]
    InvalidServoChannel(u8),

    #[error("Motor channel {0} invalid (use 0 or 1)")]
    InvalidMotorChannel(u8),

    #[error("Address 0x{0:02X} out of range (0x40-0x44)")]
    AddressOutOfRange(u8),

    #[error("I2C error at address 0x{address:02X}: {source}")]
    Bus {
        address: u8,
        #[source]
        source: io::Error,
    },

    #[error("I2C bus already closed")]
    BusClosed,
}

impl DriverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriverError::InvalidDegreeRange { .. } | DriverError::InvalidPulseRange { .. } => {
                ErrorKind::RangeConfig
            }
            DriverError::DegreeOutOfRange { .. }
            | DriverError::PercentOutOfRange { .. }
            | DriverError::InvalidDirection(_)
            | DriverError::InvalidServoChannel(_)
            | DriverError::InvalidMotorChannel(_) => ErrorKind::ParameterOutOfRange,
            DriverError::AddressOutOfRange(_) => ErrorKind::AddressOutOfRange,
            DriverError::Bus { .. } | DriverError::BusClosed => ErrorKind::Bus,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl TryFrom<u8> for ServoChannel {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ServoChannel::S1),
            2 => Ok(ServoChannel::S2),
            other => Err(DriverError::InvalidServoChannel(other)),
        }
    }
}

impl TryFrom<u8> for MotorChannel {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MotorChannel::Ma),
            1 => Ok(MotorChannel::Mb),
            other => Err(DriverError::InvalidMotorChannel(other)),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = DriverError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Direction::Cw),
            1 => Ok(Direction::Ccw),
            other => Err(DriverError::InvalidDirection(other)),
        }
    }
}

/// Map `x` from one range onto another with floor division.
///
/// Rounds toward negative infinity, the same way the firmware tooling computes
/// pulse and speed bytes. `in_max` must differ from `in_min`.
pub fn map_range(x: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
    let numerator = (x - in_min) * (out_max - out_min);
    floor_div(numerator, in_max - in_min) + out_min
}

fn floor_div(n: i32, d: i32) -> i32 {
    let q = n / d;
    if n % d != 0 && ((n < 0) != (d < 0)) {
        q - 1
    } else {
        q
    }
}

/// Additive 8-bit checksum over the first four frame bytes (not a CRC)
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Speed byte for a motor percentage (0-100 -> 0-255)
pub fn percent_to_speed(percent: i32) -> Result<u8> {
    if !(0..=MAX_PERCENT).contains(&percent) {
        return Err(DriverError::PercentOutOfRange { percent });
    }
    Ok(map_range(percent, 0, MAX_PERCENT, 0, MAX_SPEED_BYTE) as u8)
}

/// A single encoded command, ready to be written to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame([u8; FRAME_LEN]);

impl CommandFrame {
    /// Assemble a frame from its four leading bytes and append the checksum
    fn build(mode: Mode, channel: u8, high: u8, low: u8) -> Self {
        let mut bytes = [mode as u8, channel, high, low, 0];
        bytes[4] = checksum(&bytes[..4]);
        Self(bytes)
    }

    /// Servo frame carrying a pulse width (big-endian)
    pub fn servo(channel: ServoChannel, pulse: u16) -> Self {
        let [high, low] = pulse.to_be_bytes();
        Self::build(Mode::Rc, channel as u8, high, low)
    }

    /// DC motor frame carrying a speed byte and a direction
    pub fn motor(channel: MotorChannel, speed: u8, direction: Direction) -> Self {
        Self::build(Mode::Dc, channel as u8, speed, direction as u8)
    }

    /// Address change frame.
    ///
    /// The last byte is the new address plus the mode code rather than the sum
    /// of the other bytes; the firmware reads the address from it.
    pub fn set_address(new_address: u8) -> Self {
        let mode = Mode::SetAddr as u8;
        Self([mode, 0, 0, 0, new_address.wrapping_add(mode)])
    }

    /// I2C register byte (the mode)
    pub fn register(&self) -> u8 {
        self.0[0]
    }

    /// Data block written after the register
    pub fn payload(&self) -> &[u8] {
        &self.0[1..]
    }

    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X?}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_range_default_servo() {
        assert_eq!(map_range(90, 0, 180, 500, 2500), 1500);
        assert_eq!(map_range(0, 0, 180, 500, 2500), 500);
        assert_eq!(map_range(180, 0, 180, 500, 2500), 2500);
        // 1 * 2000 / 180 = 11.1 -> 11
        assert_eq!(map_range(1, 0, 180, 500, 2500), 511);
    }

    #[test]
    fn test_map_range_floors_toward_negative_infinity() {
        assert_eq!(map_range(50, 0, 100, 0, 255), 127);
        assert_eq!(map_range(1, 0, 3, 0, -1), -1); // -1/3 floors to -1, not 0
        assert_eq!(map_range(-1, 0, 2, 0, 1), -1);
        assert_eq!(map_range(1, 0, -2, 0, 1), -1);
    }

    #[test]
    fn test_checksum() {
        assert_eq!(checksum(&[0, 1, 5, 220]), 226);
        // Sum 0x200 wraps to zero
        assert_eq!(checksum(&[1, 1, 255, 255]), 0x00);
        assert_eq!(checksum(&[0, 2, 10, 255]), 11);
    }

    #[test]
    fn test_servo_frame() {
        let frame = CommandFrame::servo(ServoChannel::S1, 1500);
        assert_eq!(frame.as_bytes(), &[0, 1, 5, 220, 226]);
        assert_eq!(frame.register(), 0);
        assert_eq!(frame.payload(), &[1, 5, 220, 226]);
    }

    #[test]
    fn test_motor_frame() {
        let frame = CommandFrame::motor(MotorChannel::Ma, 127, Direction::Cw);
        assert_eq!(frame.as_bytes(), &[1, 0, 127, 0, 128]);

        let frame = CommandFrame::motor(MotorChannel::Mb, 255, Direction::Ccw);
        assert_eq!(frame.as_bytes(), &[1, 1, 255, 1, 2]);
    }

    #[test]
    fn test_set_address_frame_uses_address_checksum() {
        let frame = CommandFrame::set_address(0x41);
        assert_eq!(frame.as_bytes(), &[2, 0, 0, 0, 0x43]);
        // Not the additive checksum of the leading bytes
        assert_ne!(frame.as_bytes()[4], checksum(&frame.as_bytes()[..4]));
    }

    #[test]
    fn test_checksum_property_holds_for_servo_and_motor_frames() {
        for pulse in [0u16, 500, 1500, 2500, 2815] {
            for channel in [ServoChannel::S1, ServoChannel::S2] {
                let b = CommandFrame::servo(channel, pulse);
                let b = b.as_bytes();
                assert_eq!(b[4], checksum(&b[..4]));
            }
        }
        for percent in [0, 1, 50, 99, 100] {
            let speed = percent_to_speed(percent).unwrap();
            let b = CommandFrame::motor(MotorChannel::Mb, speed, Direction::Ccw);
            let b = b.as_bytes();
            assert_eq!(b[4], checksum(&b[..4]));
        }
    }

    #[test]
    fn test_percent_to_speed() {
        assert_eq!(percent_to_speed(0).unwrap(), 0);
        assert_eq!(percent_to_speed(100).unwrap(), 255);
        assert!(matches!(
            percent_to_speed(101),
            Err(DriverError::PercentOutOfRange { percent: 101 })
        ));
        assert!(percent_to_speed(-1).is_err());
    }

    #[test]
    fn test_raw_conversions() {
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Ccw);
        assert!(matches!(
            Direction::try_from(2),
            Err(DriverError::InvalidDirection(2))
        ));
        assert_eq!(ServoChannel::try_from(2).unwrap(), ServoChannel::S2);
        assert!(ServoChannel::try_from(0).is_err());
        assert_eq!(MotorChannel::try_from(0).unwrap(), MotorChannel::Ma);
        assert!(MotorChannel::try_from(3).is_err());
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            DriverError::InvalidPulseRange { min: 0, max: 0 }.kind(),
            ErrorKind::RangeConfig
        );
        assert_eq!(
            DriverError::InvalidDirection(9).kind(),
            ErrorKind::ParameterOutOfRange
        );
        assert_eq!(
            DriverError::AddressOutOfRange(0x50).kind(),
            ErrorKind::AddressOutOfRange
        );
        assert_eq!(DriverError::BusClosed.kind(), ErrorKind::Bus);
    }

    #[test]
    fn test_frame_display() {
        let frame = CommandFrame::motor(MotorChannel::Ma, 127, Direction::Cw);
        assert_eq!(frame.to_string(), "[01, 00, 7F, 00, 80]");
    }
}
