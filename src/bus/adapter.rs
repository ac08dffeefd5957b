use crate::bus::{BridgeSettings, I2cAddress};
use crate::errors::BusResult;

/// Low-level link to the bridge chip.
///
/// Every call is one complete, synchronous bus operation against `address`.
/// Implementations must return an error rather than block forever; the
/// transaction timeout comes from [`BridgeSettings::timeout_ms`].
pub trait I2cAdapter: Send {
    /// Human readable identity used in logs and errors
    fn describe(&self) -> String;

    /// Apply protocol, clock and bit order. Called once by [`crate::bus::Bridge::open`].
    fn configure(&mut self, settings: &BridgeSettings) -> BusResult<()>;

    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()>;

    fn read(&mut self, address: I2cAddress, buf: &mut [u8]) -> BusResult<()>;

    /// Write followed by a read from the same device. Adapters that can issue
    /// a repeated start should override this.
    fn write_read(&mut self, address: I2cAddress, bytes: &[u8], buf: &mut [u8]) -> BusResult<()> {
        self.write(address, bytes)?;
        self.read(address, buf)
    }
}
