pub mod bus_config;
pub mod sensor_config;

pub use bus_config::{load_bus_config, BusConfig, MuxEntry};
pub use sensor_config::{load_sensor_config, OutputFormat, SensorConfig, SensorEntry};

use std::collections::HashSet;

use crate::errors::{ConfigError, ConfigResult};

/// Everything needed to wire up the hub: `buses.toml` plus `sensors.toml`
#[derive(Debug)]
pub struct HubConfig {
    pub bus: BusConfig,
    pub sensors: SensorConfig,
}

impl HubConfig {
    /// Load both files from `config_dir` and check them against each other
    pub fn load(config_dir: &str) -> ConfigResult<Self> {
        let bus = load_bus_config(&format!("{}/buses.toml", config_dir))?;
        let sensors = load_sensor_config(&format!("{}/sensors.toml", config_dir))?;
        let config = Self { bus, sensors };
        config.validate()?;
        Ok(config)
    }

    /// Cross-checks that cannot be expressed in the file schema.
    ///
    /// Runs before the bridge is opened, so bad wiring never reaches the bus.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut mux_ids = HashSet::new();
        let mut mux_addresses = HashSet::new();
        for mux in &self.bus.muxes {
            if !mux_ids.insert(mux.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate mux id '{}'",
                    mux.id
                )));
            }
            if !mux_addresses.insert(mux.address) {
                return Err(ConfigError::ValidationError(format!(
                    "mux '{}' reuses address {}",
                    mux.id, mux.address
                )));
            }
        }

        let mut sensor_ids = HashSet::new();
        let mut endpoints = HashSet::new();
        let mut direct_addresses = HashSet::new();
        let mut muxed_addresses = HashSet::new();
        for sensor in &self.sensors.sensors {
            if !sensor_ids.insert(sensor.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate sensor id '{}'",
                    sensor.id
                )));
            }
            if mux_addresses.contains(&sensor.address) {
                return Err(ConfigError::ValidationError(format!(
                    "sensor '{}' uses mux address {}",
                    sensor.id, sensor.address
                )));
            }
            if sensor.frequency == Some(0) {
                return Err(ConfigError::InvalidValue {
                    field: format!("sensor.{}.frequency", sensor.id),
                    reason: "must be at least 1 Hz".to_string(),
                });
            }

            let route = match (&sensor.mux, sensor.channel) {
                (Some(mux_id), Some(channel)) => {
                    let mux = self.bus.mux(mux_id).ok_or_else(|| {
                        ConfigError::ValidationError(format!(
                            "sensor '{}' references unknown mux '{}'",
                            sensor.id, mux_id
                        ))
                    })?;
                    if channel >= mux.model.channels() {
                        return Err(ConfigError::InvalidChannel {
                            channel,
                            model: mux.model.name().to_string(),
                            channels: mux.model.channels(),
                        });
                    }
                    Some((mux_id.as_str(), channel))
                }
                (Some(mux_id), None) => {
                    return Err(ConfigError::ValidationError(format!(
                        "sensor '{}' is on mux '{}' but has no channel",
                        sensor.id, mux_id
                    )));
                }
                (None, Some(_)) => {
                    return Err(ConfigError::ValidationError(format!(
                        "sensor '{}' has a channel but no mux",
                        sensor.id
                    )));
                }
                (None, None) => None,
            };

            if !endpoints.insert((route, sensor.address)) {
                return Err(ConfigError::ValidationError(format!(
                    "sensor '{}' collides with another device at {}",
                    sensor.id, sensor.address
                )));
            }

            // A direct device answers on every mux channel, so its address is
            // reserved for the whole bus.
            let clash = match route {
                Some(_) => {
                    muxed_addresses.insert(sensor.address);
                    direct_addresses.contains(&sensor.address)
                }
                None => {
                    direct_addresses.insert(sensor.address);
                    muxed_addresses.contains(&sensor.address)
                }
            };
            if clash {
                return Err(ConfigError::ValidationError(format!(
                    "sensor '{}' at {} is shared between the direct bus and a mux channel",
                    sensor.id, sensor.address
                )));
            }
        }

        Ok(())
    }
}
