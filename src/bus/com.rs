use crate::bus::{AddressedChannel, I2cAdapter, I2cAddress, MuxedChannel};
use crate::errors::CommResult;

/// Byte-level access to one device, as seen by a sensor driver.
///
/// Drivers are written against this trait only and cannot tell a directly
/// wired device from one behind a multiplexer.
pub trait I2cCom {
    /// Address of the device this handle talks to
    fn address(&self) -> I2cAddress;

    fn write(&self, bytes: &[u8]) -> CommResult<()>;

    fn read(&self, length: usize) -> CommResult<Vec<u8>>;

    /// Write then read without letting other traffic onto the bus in between
    fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>>;
}

impl<A: I2cAdapter> I2cCom for AddressedChannel<'_, A> {
    fn address(&self) -> I2cAddress {
        AddressedChannel::address(self)
    }

    fn write(&self, bytes: &[u8]) -> CommResult<()> {
        AddressedChannel::write(self, bytes)
    }

    fn read(&self, length: usize) -> CommResult<Vec<u8>> {
        AddressedChannel::read(self, length)
    }

    fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>> {
        AddressedChannel::write_read(self, bytes, length)
    }
}

impl<A: I2cAdapter> I2cCom for MuxedChannel<'_, A> {
    fn address(&self) -> I2cAddress {
        self.target()
    }

    fn write(&self, bytes: &[u8]) -> CommResult<()> {
        MuxedChannel::write(self, bytes)
    }

    fn read(&self, length: usize) -> CommResult<Vec<u8>> {
        MuxedChannel::read(self, length)
    }

    fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>> {
        MuxedChannel::write_read(self, bytes, length)
    }
}

/// Either wiring of a device, chosen when the device is set up
#[derive(Debug)]
pub enum DeviceCom<'bus, A> {
    Direct(AddressedChannel<'bus, A>),
    Muxed(MuxedChannel<'bus, A>),
}

impl<'bus, A> From<AddressedChannel<'bus, A>> for DeviceCom<'bus, A> {
    fn from(channel: AddressedChannel<'bus, A>) -> Self {
        DeviceCom::Direct(channel)
    }
}

impl<'bus, A> From<MuxedChannel<'bus, A>> for DeviceCom<'bus, A> {
    fn from(channel: MuxedChannel<'bus, A>) -> Self {
        DeviceCom::Muxed(channel)
    }
}

impl<A: I2cAdapter> I2cCom for DeviceCom<'_, A> {
    fn address(&self) -> I2cAddress {
        match self {
            DeviceCom::Direct(c) => I2cCom::address(c),
            DeviceCom::Muxed(c) => I2cCom::address(c),
        }
    }

    fn write(&self, bytes: &[u8]) -> CommResult<()> {
        match self {
            DeviceCom::Direct(c) => c.write(bytes),
            DeviceCom::Muxed(c) => c.write(bytes),
        }
    }

    fn read(&self, length: usize) -> CommResult<Vec<u8>> {
        match self {
            DeviceCom::Direct(c) => c.read(length),
            DeviceCom::Muxed(c) => c.read(length),
        }
    }

    fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>> {
        match self {
            DeviceCom::Direct(c) => c.write_read(bytes, length),
            DeviceCom::Muxed(c) => c.write_read(bytes, length),
        }
    }
}
