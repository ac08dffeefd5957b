use crate::bus::{Bridge, BusTransaction, I2cAdapter, I2cAddress};
use crate::errors::{BusResult, CommResult};

/// A handle bound to one device address on a shared [`Bridge`].
///
/// Adds nothing on top of the bridge: no buffering, no retries. Channels are
/// `Copy`; any number of them may point at the same bridge.
pub struct AddressedChannel<'bus, A> {
    bridge: &'bus Bridge<A>,
    address: I2cAddress,
}

impl<A> Clone for AddressedChannel<'_, A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for AddressedChannel<'_, A> {}

impl<'bus, A: I2cAdapter> AddressedChannel<'bus, A> {
    pub fn new(bridge: &'bus Bridge<A>, address: I2cAddress) -> Self {
        Self { bridge, address }
    }

    pub fn address(&self) -> I2cAddress {
        self.address
    }

    pub fn bridge(&self) -> &'bus Bridge<A> {
        self.bridge
    }

    pub fn write(&self, bytes: &[u8]) -> CommResult<()> {
        Ok(self.bridge.write(self.address, bytes)?)
    }

    pub fn read(&self, length: usize) -> CommResult<Vec<u8>> {
        Ok(self.bridge.read(self.address, length)?)
    }

    pub fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>> {
        Ok(self.bridge.write_read(self.address, bytes, length)?)
    }

    /// Write as part of a transaction the caller already holds
    pub fn write_in(&self, tx: &mut BusTransaction<'_, A>, bytes: &[u8]) -> BusResult<()> {
        tx.write(self.address, bytes)
    }

    /// Read as part of a transaction the caller already holds
    pub fn read_in(&self, tx: &mut BusTransaction<'_, A>, length: usize) -> BusResult<Vec<u8>> {
        tx.read(self.address, length)
    }
}

impl<A> std::fmt::Debug for AddressedChannel<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressedChannel")
            .field("address", &self.address)
            .finish()
    }
}
