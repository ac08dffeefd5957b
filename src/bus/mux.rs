use tracing::{debug, trace};

use crate::bus::{AddressedChannel, I2cAdapter, I2cAddress, MuxModel, MuxPort};
use crate::errors::{BusError, CommError, CommResult, ConfigResult};

/// A device that sits behind one output of a channel multiplexer.
///
/// Every operation is a single bridge transaction made of two steps: write
/// the port's control byte to the multiplexer, then talk to the target. The
/// multiplexer's routing is bus state that other channels change freely, so
/// the port is selected again on every call.
pub struct MuxedChannel<'bus, A> {
    mux: AddressedChannel<'bus, A>,
    port: MuxPort,
    target: I2cAddress,
}

impl<'bus, A: I2cAdapter> MuxedChannel<'bus, A> {
    pub fn new(
        mux: AddressedChannel<'bus, A>,
        model: MuxModel,
        channel: u8,
        target: I2cAddress,
    ) -> ConfigResult<Self> {
        let port = MuxPort::new(model, channel)?;
        debug!(
            "[mux] {} behind {} {} channel {}",
            target,
            model.name(),
            mux.address(),
            channel
        );
        Ok(Self { mux, port, target })
    }

    pub fn target(&self) -> I2cAddress {
        self.target
    }

    pub fn mux_address(&self) -> I2cAddress {
        self.mux.address()
    }

    pub fn channel(&self) -> u8 {
        self.port.index()
    }

    pub fn write(&self, bytes: &[u8]) -> CommResult<()> {
        self.routed(|tx, target| tx.write(target, bytes))
    }

    pub fn read(&self, length: usize) -> CommResult<Vec<u8>> {
        self.routed(|tx, target| tx.read(target, length))
    }

    pub fn write_read(&self, bytes: &[u8], length: usize) -> CommResult<Vec<u8>> {
        self.routed(|tx, target| tx.write_read(target, bytes, length))
    }

    /// Select the port, then run `forward` against the target, holding the
    /// bridge for both steps.
    fn routed<T, F>(&self, forward: F) -> CommResult<T>
    where
        F: FnOnce(&mut crate::bus::BusTransaction<'_, A>, I2cAddress) -> Result<T, BusError>,
    {
        let channel = self.port.index();
        self.mux.bridge().transaction(|tx| {
            trace!("[mux] {} select channel {}", self.mux.address(), channel);
            self.mux
                .write_in(tx, &[self.port.select_byte()])
                .map_err(|source| CommError::MuxSelect {
                    mux: self.mux.address(),
                    channel,
                    source,
                })?;

            forward(tx, self.target).map_err(|source| CommError::MuxTarget {
                mux: self.mux.address(),
                channel,
                target: self.target,
                source,
            })
        })
    }
}

impl<A> std::fmt::Debug for MuxedChannel<'_, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MuxedChannel")
            .field("mux", &self.mux)
            .field("port", &self.port)
            .field("target", &self.target)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::{BusOp, SimAdapter};
    use crate::bus::{Bridge, BridgeSettings};
    use crate::errors::ConfigError;

    fn addr(value: u8) -> I2cAddress {
        I2cAddress::new(value).unwrap()
    }

    #[test]
    fn test_write_selects_then_forwards() {
        let sim = SimAdapter::new().mux(addr(0x70));
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x70));
        let sht = MuxedChannel::new(mux, MuxModel::Pca9548a, 5, addr(0x44)).unwrap();

        sht.write(&[0x01]).unwrap();

        assert_eq!(
            log.ops(),
            vec![
                BusOp::Write { address: addr(0x70), bytes: vec![0x20] },
                BusOp::Write { address: addr(0x44), bytes: vec![0x01] },
            ]
        );
    }

    #[test]
    fn test_read_reselects_every_time() {
        let sim = SimAdapter::new()
            .mux(addr(0x70))
            .respond(addr(0x44), &[0x66, 0x77]);
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x70));
        let sht = MuxedChannel::new(mux, MuxModel::Pca9548a, 0, addr(0x44)).unwrap();

        assert_eq!(sht.read(2).unwrap(), vec![0x66, 0x77]);
        assert_eq!(sht.read(2).unwrap(), vec![0x66, 0x77]);

        assert_eq!(log.ops_to(addr(0x70)).len(), 2);
        assert_eq!(log.ops_to(addr(0x44)).len(), 2);
    }

    #[test]
    fn test_select_failure_skips_target() {
        let sim = SimAdapter::new().nack(addr(0x70));
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x70));
        let sht = MuxedChannel::new(mux, MuxModel::Pca9548a, 3, addr(0x44)).unwrap();

        let err = sht.write(&[0x24, 0x00]).unwrap_err();
        assert!(err.is_select_failure());
        assert_eq!(
            err,
            CommError::MuxSelect {
                mux: addr(0x70),
                channel: 3,
                source: BusError::Nack { address: addr(0x70) },
            }
        );
        assert!(log.ops_to(addr(0x44)).is_empty());
    }

    #[test]
    fn test_target_failure_is_reported_as_target() {
        let sim = SimAdapter::new().mux(addr(0x70)).nack(addr(0x44));
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x70));
        let sht = MuxedChannel::new(mux, MuxModel::Pca9548a, 1, addr(0x44)).unwrap();

        let err = sht.read(6).unwrap_err();
        assert!(!err.is_select_failure());
        assert!(matches!(
            err,
            CommError::MuxTarget { channel: 1, .. }
        ));
        assert_eq!(err.bus_error(), &BusError::Nack { address: addr(0x44) });
    }

    #[test]
    fn test_channel_validated_before_bus_activity() {
        let sim = SimAdapter::new();
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x70));

        let err = MuxedChannel::new(mux, MuxModel::Pca9548a, 8, addr(0x44)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChannel { channel: 8, .. }));
        assert!(log.ops().is_empty());
    }

    #[test]
    fn test_pca9544a_control_byte() {
        let sim = SimAdapter::new().mux(addr(0x71));
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();
        let mux = AddressedChannel::new(&bridge, addr(0x71));
        let dev = MuxedChannel::new(mux, MuxModel::Pca9544a, 2, addr(0x48)).unwrap();

        dev.write_read(&[0x00], 2).unwrap();

        assert_eq!(
            log.ops()[0],
            BusOp::Write { address: addr(0x71), bytes: vec![0x06] }
        );
    }
}
