// I2C transports for the L9110 driver
//
// The driver only needs one operation from the bus: a block write of a
// register byte followed by data. Anything implementing embedded-hal's I2c
// trait can be used through HalBus.

use std::io;

use embedded_hal::i2c::{Error as _, I2c};
use tracing::{debug, info};

/// Transport used by the driver to reach the device
pub trait Bus {
    /// Write `register` followed by `payload` to the device at `address`
    fn write_block(&mut self, address: u8, register: u8, payload: &[u8]) -> io::Result<()>;

    /// Release the underlying device. Called at most once by the driver.
    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<B: Bus + ?Sized> Bus for Box<B> {
    fn write_block(&mut self, address: u8, register: u8, payload: &[u8]) -> io::Result<()> {
        (**self).write_block(address, register, payload)
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Adapter for any embedded-hal 1.0 I2C implementation
pub struct HalBus<I2C> {
    i2c: Option<I2C>,
}

impl<I2C: I2c> HalBus<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c: Some(i2c) }
    }

    /// Take the I2C peripheral back, if the bus was not closed
    pub fn release(mut self) -> Option<I2C> {
        self.i2c.take()
    }
}

impl<I2C: I2c> Bus for HalBus<I2C> {
    fn write_block(&mut self, address: u8, register: u8, payload: &[u8]) -> io::Result<()> {
        let i2c = self
            .i2c
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "I2C bus closed"))?;

        let mut buf = Vec::with_capacity(payload.len() + 1);
        buf.push(register);
        buf.extend_from_slice(payload);

        i2c.write(address, &buf)
            .map_err(|e| io::Error::other(format!("I2C write failed: {:?}", e.kind())))
    }

    fn close(&mut self) -> io::Result<()> {
        // Dropping the peripheral releases the device handle
        self.i2c = None;
        Ok(())
    }
}

/// Dry-run transport: logs each write and keeps a copy of it
#[derive(Debug, Default)]
pub struct LogBus {
    writes: Vec<(u8, u8, Vec<u8>)>,
}

impl LogBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes seen so far as (address, register, payload)
    pub fn writes(&self) -> &[(u8, u8, Vec<u8>)] {
        &self.writes
    }
}

impl Bus for LogBus {
    fn write_block(&mut self, address: u8, register: u8, payload: &[u8]) -> io::Result<()> {
        info!(
            "[dry-run] write to 0x{:02X}: reg={}, data={:?}",
            address, register, payload
        );
        self.writes.push((address, register, payload.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        debug!("[dry-run] bus closed after {} writes", self.writes.len());
        Ok(())
    }
}

/// Linux /dev/i2c-N access
#[cfg(target_os = "linux")]
pub mod linux {
    use std::io;

    use linux_embedded_hal::I2cdev;
    use tracing::info;

    use super::HalBus;
    use crate::config::bus_path;

    pub type LinuxBus = HalBus<I2cdev>;

    /// Open the I2C adapter with the given number (1 -> /dev/i2c-1)
    pub fn open_bus(bus_number: u8) -> io::Result<LinuxBus> {
        let path = bus_path(bus_number);
        info!("Opening I2C bus {}", path);
        let dev = I2cdev::new(&path).map_err(io::Error::other)?;
        Ok(HalBus::new(dev))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared view of what a MockBus did, kept after the bus moves into a driver
    #[derive(Debug, Default)]
    pub struct MockState {
        pub writes: Vec<(u8, u8, Vec<u8>)>,
        pub fail_writes: bool,
        pub close_calls: usize,
    }

    #[derive(Debug, Default, Clone)]
    pub struct MockBus {
        pub state: Rc<RefCell<MockState>>,
    }

    impl MockBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_fail(&self, fail: bool) {
            self.state.borrow_mut().fail_writes = fail;
        }

        pub fn writes(&self) -> Vec<(u8, u8, Vec<u8>)> {
            self.state.borrow().writes.clone()
        }

        pub fn close_calls(&self) -> usize {
            self.state.borrow().close_calls
        }
    }

    impl Bus for MockBus {
        fn write_block(&mut self, address: u8, register: u8, payload: &[u8]) -> io::Result<()> {
            let mut state = self.state.borrow_mut();
            if state.fail_writes {
                return Err(io::Error::other("simulated NACK"));
            }
            state.writes.push((address, register, payload.to_vec()));
            Ok(())
        }

        fn close(&mut self) -> io::Result<()> {
            self.state.borrow_mut().close_calls += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, NoAcknowledgeSource, Operation};

    /// Minimal embedded-hal I2C device recording raw writes
    #[derive(Default)]
    struct FakeI2c {
        writes: Vec<(u8, Vec<u8>)>,
        nack: bool,
    }

    impl ErrorType for FakeI2c {
        type Error = ErrorKind;
    }

    impl I2c for FakeI2c {
        fn transaction(
            &mut self,
            address: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            if self.nack {
                return Err(ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
            }
            for op in operations {
                if let Operation::Write(bytes) = op {
                    self.writes.push((address, bytes.to_vec()));
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_hal_bus_prepends_register() {
        let mut bus = HalBus::new(FakeI2c::default());
        bus.write_block(0x40, 0, &[1, 5, 220, 226]).unwrap();

        let i2c = bus.release().unwrap();
        assert_eq!(i2c.writes, vec![(0x40, vec![0, 1, 5, 220, 226])]);
    }

    #[test]
    fn test_hal_bus_maps_errors_to_io() {
        let mut bus = HalBus::new(FakeI2c {
            nack: true,
            ..FakeI2c::default()
        });
        let err = bus.write_block(0x40, 1, &[0, 0, 0, 1]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        assert!(err.to_string().contains("NoAcknowledge"));
    }

    #[test]
    fn test_hal_bus_rejects_writes_after_close() {
        let mut bus = HalBus::new(FakeI2c::default());
        bus.close().unwrap();
        let err = bus.write_block(0x40, 0, &[0; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
        assert!(bus.release().is_none());
    }

    #[test]
    fn test_log_bus_records_writes() {
        let mut bus = LogBus::new();
        bus.write_block(0x42, 1, &[0, 127, 0, 128]).unwrap();
        assert_eq!(bus.writes(), &[(0x42, 1, vec![0, 127, 0, 128])]);
    }
}
