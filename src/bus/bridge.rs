use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::bus::{I2cAdapter, I2cAddress};
use crate::errors::{BridgeError, BusResult};

/// Serial protocol the bridge chip is switched into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    I2c,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum BusSpeed {
    #[serde(rename = "100khz")]
    Standard,
    #[default]
    #[serde(rename = "400khz")]
    Fast,
    #[serde(rename = "1mhz")]
    FastPlus,
}

impl BusSpeed {
    pub fn hz(self) -> u32 {
        match self {
            BusSpeed::Standard => 100_000,
            BusSpeed::Fast => 400_000,
            BusSpeed::FastPlus => 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    #[default]
    MsbFirst,
    LsbFirst,
}

/// Link settings applied once when the bridge is opened
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    pub protocol: Protocol,
    pub speed: BusSpeed,
    pub bit_order: BitOrder,
    pub timeout_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::I2c,
            speed: BusSpeed::Fast,
            bit_order: BitOrder::MsbFirst,
            timeout_ms: 100,
        }
    }
}

/// The single owner of the physical I2C link.
///
/// All traffic goes through one mutex, so at most one transaction is on the
/// wire at any time. Channels borrow the bridge; whoever holds the `Bridge`
/// value decides when the adapter is torn down.
pub struct Bridge<A> {
    adapter: Mutex<A>,
    settings: BridgeSettings,
    name: String,
}

impl<A: I2cAdapter> Bridge<A> {
    /// Configure the adapter and take ownership of it.
    pub fn open(mut adapter: A, settings: BridgeSettings) -> Result<Self, BridgeError> {
        let name = adapter.describe();
        adapter
            .configure(&settings)
            .map_err(|source| BridgeError::Configure {
                adapter: name.clone(),
                source,
            })?;

        debug!(
            "[bridge] {} configured: {:?} at {} Hz, {:?}, timeout {} ms",
            name,
            settings.protocol,
            settings.speed.hz(),
            settings.bit_order,
            settings.timeout_ms
        );

        Ok(Self {
            adapter: Mutex::new(adapter),
            settings,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Run `f` with exclusive access to the link.
    ///
    /// Nothing else reaches the bus until `f` returns, whether it succeeds,
    /// fails or panics. Multi-step sequences such as mux select + forward must
    /// run inside a single call.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut BusTransaction<'_, A>) -> Result<T, E>,
    {
        // A panic mid-transaction leaves the adapter usable; the next
        // transaction re-establishes whatever bus state it needs.
        let mut adapter = self.adapter.lock().unwrap_or_else(PoisonError::into_inner);
        let mut tx = BusTransaction {
            adapter: &mut *adapter,
        };
        f(&mut tx)
    }

    pub fn write(&self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        self.transaction(|tx| tx.write(address, bytes))
    }

    pub fn read(&self, address: I2cAddress, length: usize) -> BusResult<Vec<u8>> {
        self.transaction(|tx| tx.read(address, length))
    }

    pub fn write_read(&self, address: I2cAddress, bytes: &[u8], length: usize) -> BusResult<Vec<u8>> {
        self.transaction(|tx| tx.write_read(address, bytes, length))
    }

    /// Tear down the bridge and hand the adapter back.
    pub fn into_adapter(self) -> A {
        self.adapter.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive access to the adapter for the duration of one
/// [`Bridge::transaction`] call
pub struct BusTransaction<'a, A> {
    adapter: &'a mut A,
}

impl<A: I2cAdapter> BusTransaction<'_, A> {
    pub fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        trace!("[bridge] write {} {:02x?}", address, bytes);
        self.adapter.write(address, bytes)
    }

    pub fn read(&mut self, address: I2cAddress, length: usize) -> BusResult<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.adapter.read(address, &mut buf)?;
        trace!("[bridge] read {} -> {:02x?}", address, buf);
        Ok(buf)
    }

    pub fn write_read(&mut self, address: I2cAddress, bytes: &[u8], length: usize) -> BusResult<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.adapter.write_read(address, bytes, &mut buf)?;
        trace!("[bridge] write_read {} {:02x?} -> {:02x?}", address, bytes, buf);
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::{BusOp, SimAdapter};
    use crate::errors::BusError;

    fn addr(value: u8) -> I2cAddress {
        I2cAddress::new(value).unwrap()
    }

    #[test]
    fn test_open_applies_settings() {
        let sim = SimAdapter::new();
        let log = sim.log();
        let settings = BridgeSettings {
            speed: BusSpeed::Standard,
            ..Default::default()
        };
        let bridge = Bridge::open(sim, settings.clone()).unwrap();

        assert_eq!(bridge.settings(), &settings);
        assert_eq!(log.configured(), Some(settings));
    }

    #[test]
    fn test_open_fails_when_adapter_rejects_settings() {
        let sim = SimAdapter::new().reject_configure("lsb-first transfers");
        let err = Bridge::open(sim, BridgeSettings::default()).err().unwrap();
        assert!(matches!(err, BridgeError::Configure { .. }));
    }

    #[test]
    fn test_write_and_read_reach_adapter() {
        let sim = SimAdapter::new().respond(addr(0x21), &[0x0A, 0xF0]);
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();

        bridge.write(addr(0x21), &[0x80]).unwrap();
        assert_eq!(bridge.read(addr(0x21), 2).unwrap(), vec![0x0A, 0xF0]);

        assert_eq!(
            log.ops(),
            vec![
                BusOp::Write { address: addr(0x21), bytes: vec![0x80] },
                BusOp::Read { address: addr(0x21), length: 2 },
            ]
        );
    }

    #[test]
    fn test_lock_released_after_failure() {
        let sim = SimAdapter::new().nack(addr(0x10));
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();

        let err = bridge.write(addr(0x10), &[0x00]).unwrap_err();
        assert_eq!(err, BusError::Nack { address: addr(0x10) });

        // Would deadlock if the failed call kept the lock
        bridge.write(addr(0x11), &[0x00]).unwrap();
    }

    #[test]
    fn test_lock_recovered_after_panic() {
        let bridge = Bridge::open(SimAdapter::new(), BridgeSettings::default()).unwrap();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: BusResult<()> = bridge.transaction(|_| panic!("driver bug"));
        }));
        assert!(result.is_err());

        bridge.write(addr(0x11), &[0x01]).unwrap();
    }
}
