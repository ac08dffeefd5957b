use serde::Deserialize;
use std::fs;

use crate::bus::I2cAddress;
use crate::errors::{ConfigError, ConfigResult};

/// Root configuration struct expecting `[[sensor]]` TOML array format
#[derive(Debug, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(rename = "sensor", default)]
    pub sensors: Vec<SensorEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Log,
    Json,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Reads per sensor before stopping; 0 polls forever
    pub cycles: u64,
    pub format: OutputFormat,
}

/// One sensor entry, matching each `[[sensor]]` section
#[derive(Debug, Clone, Deserialize)]
pub struct SensorEntry {
    pub id: String,
    pub driver: String,
    pub address: I2cAddress,
    /// Id of the `[[mux]]` the sensor hangs off, if any
    pub mux: Option<String>,
    pub channel: Option<u8>,
    /// Polling rate in Hz
    pub frequency: Option<u32>,
    /// ADC reference voltage
    pub vref: Option<f64>,
    /// ADC inputs to sample
    pub channels: Option<Vec<u8>>,
}

pub fn parse_sensor_config(content: &str, path: &str) -> ConfigResult<SensorConfig> {
    toml::from_str(content).map_err(|source| ConfigError::FormatError {
        path: path.to_string(),
        source,
    })
}

/// Loads config from TOML file
pub fn load_sensor_config(path: &str) -> ConfigResult<SensorConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    parse_sensor_config(&content, path)
}
