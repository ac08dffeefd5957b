use std::collections::HashMap;

use tracing::info;

use crate::bus::{AddressedChannel, Bridge, DeviceCom, I2cAdapter, MuxModel, MuxedChannel};
use crate::config::HubConfig;
use crate::errors::{ConfigError, RegistryError, RegistryResult};
use crate::sensors::{create_sensor_driver, SensorDriver};

/// Wire every configured sensor to `bridge` and initialize it.
///
/// Sensors that name a mux get a [`MuxedChannel`] through that mux's own
/// [`AddressedChannel`]; the rest talk to the bridge directly.
pub fn init_all<'bus, A: I2cAdapter>(
    config: &HubConfig,
    bridge: &'bus Bridge<A>,
) -> RegistryResult<Vec<Box<dyn SensorDriver + 'bus>>> {
    let muxes: HashMap<&str, (AddressedChannel<'bus, A>, MuxModel)> = config
        .bus
        .muxes
        .iter()
        .map(|m| (m.id.as_str(), (AddressedChannel::new(bridge, m.address), m.model)))
        .collect();

    let mut sensors: Vec<Box<dyn SensorDriver + 'bus>> = Vec::new();
    info!("[registry] initializing {} sensors...", config.sensors.sensors.len());
    for s in config.sensors.sensors.iter() {
        let com: DeviceCom<'bus, A> = match (&s.mux, s.channel) {
            (Some(mux_id), Some(channel)) => {
                let (mux, model) = muxes.get(mux_id.as_str()).copied().ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "sensor '{}' references unknown mux '{}'",
                        s.id, mux_id
                    ))
                })?;
                MuxedChannel::new(mux, model, channel, s.address)?.into()
            }
            (None, None) => AddressedChannel::new(bridge, s.address).into(),
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "sensor '{}' needs both mux and channel, or neither",
                    s.id
                ))
                .into());
            }
        };

        let mut sensor = create_sensor_driver(s, com).map_err(|source| {
            RegistryError::DriverCreationError {
                sensor: s.id.clone(),
                source,
            }
        })?;
        match (&s.mux, s.channel) {
            (Some(mux_id), Some(channel)) => info!(
                "[registry] registering sensor: id={} driver={} address={} via {} channel {}",
                s.id, s.driver, s.address, mux_id, channel
            ),
            _ => info!(
                "[registry] registering sensor: id={} driver={} address={}",
                s.id, s.driver, s.address
            ),
        }

        sensor.init().map_err(|source| RegistryError::RegistrationError {
            sensor: s.id.clone(),
            source,
        })?;
        sensors.push(sensor);
    }

    Ok(sensors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::sim::SimAdapter;
    use crate::bus::{BridgeSettings, I2cAddress};
    use crate::config::bus_config::parse_bus_config;
    use crate::config::sensor_config::parse_sensor_config;
    use crate::errors::SensorError;

    fn addr(value: u8) -> I2cAddress {
        I2cAddress::new(value).unwrap()
    }

    fn hub(buses: &str, sensors: &str) -> HubConfig {
        HubConfig {
            bus: parse_bus_config(buses, "buses.toml").unwrap(),
            sensors: parse_sensor_config(sensors, "sensors.toml").unwrap(),
        }
    }

    #[test]
    fn test_unknown_driver_reported_with_sensor_id() {
        let cfg = hub(
            "[bridge]\npath = \"sim\"\n",
            "[[sensor]]\nid = \"x\"\ndriver = \"bme280\"\naddress = 0x76\n",
        );
        let bridge = Bridge::open(SimAdapter::new(), BridgeSettings::default()).unwrap();

        let result = init_all(&cfg, &bridge);
        match result {
            Err(RegistryError::DriverCreationError { sensor, source }) => {
                assert_eq!(sensor, "x");
                assert!(matches!(source, SensorError::UnsupportedDriver { .. }));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("unknown driver accepted"),
        }
    }

    #[test]
    fn test_absent_device_fails_registration() {
        let cfg = hub(
            "[bridge]\npath = \"sim\"\n",
            "[[sensor]]\nid = \"adc\"\ndriver = \"ad7998\"\naddress = 0x21\n",
        );
        let sim = SimAdapter::new().nack(addr(0x21));
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();

        assert!(matches!(
            init_all(&cfg, &bridge),
            Err(RegistryError::RegistrationError { .. })
        ));
    }

    #[test]
    fn test_muxed_sensor_goes_through_its_mux() {
        let cfg = hub(
            "[bridge]\npath = \"sim\"\n[[mux]]\nid = \"mux1\"\naddress = 0x71\n",
            "[[sensor]]\nid = \"adc\"\ndriver = \"ad7994\"\naddress = 0x23\nmux = \"mux1\"\nchannel = 6\n",
        );
        let sim = SimAdapter::new()
            .mux(addr(0x71))
            .attach(addr(0x23), addr(0x71), 0x40);
        let log = sim.log();
        let bridge = Bridge::open(sim, BridgeSettings::default()).unwrap();

        let sensors = init_all(&cfg, &bridge).unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].id(), "adc");
        assert_eq!(log.ops_to(addr(0x71)).len(), 1);
        assert_eq!(log.ops_to(addr(0x23)).len(), 1);
    }
}
