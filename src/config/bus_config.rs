use serde::Deserialize;
use std::fs;

use crate::bus::{BridgeSettings, I2cAddress, MuxModel};
use crate::errors::{ConfigError, ConfigResult};

/// Root structure of `buses.toml`: one `[bridge]` table and `[[mux]]` entries
#[derive(Debug, Deserialize)]
pub struct BusConfig {
    pub bridge: BridgeEntry,
    #[serde(rename = "mux", default)]
    pub muxes: Vec<MuxEntry>,
}

/// The physical USB-to-I2C adapter and its link settings
#[derive(Debug, Deserialize)]
pub struct BridgeEntry {
    /// Device node of the adapter, e.g. `/dev/i2c-1`
    pub path: String,
    #[serde(flatten)]
    pub settings: BridgeSettings,
}

/// One channel multiplexer wired directly to the bridge
#[derive(Debug, Deserialize)]
pub struct MuxEntry {
    pub id: String,
    pub address: I2cAddress,
    #[serde(default)]
    pub model: MuxModel,
}

impl BusConfig {
    pub fn mux(&self, id: &str) -> Option<&MuxEntry> {
        self.muxes.iter().find(|m| m.id == id)
    }
}

pub fn parse_bus_config(content: &str, path: &str) -> ConfigResult<BusConfig> {
    toml::from_str(content).map_err(|source| ConfigError::FormatError {
        path: path.to_string(),
        source,
    })
}

/// Load bus config file
pub fn load_bus_config(path: &str) -> ConfigResult<BusConfig> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::LoadError {
        path: path.to_string(),
        source,
    })?;
    parse_bus_config(&content, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BitOrder, BusSpeed};

    #[test]
    fn test_parse_full_bus_config() {
        let cfg = parse_bus_config(
            r#"
            [bridge]
            path = "/dev/i2c-1"
            speed = "100khz"
            bit_order = "msb_first"
            timeout_ms = 250

            [[mux]]
            id = "mux0"
            address = 0x70
            model = "tca9548a"

            [[mux]]
            id = "mux1"
            address = 0x71
            model = "pca9544a"
            "#,
            "buses.toml",
        )
        .unwrap();

        assert_eq!(cfg.bridge.path, "/dev/i2c-1");
        assert_eq!(cfg.bridge.settings.speed, BusSpeed::Standard);
        assert_eq!(cfg.bridge.settings.bit_order, BitOrder::MsbFirst);
        assert_eq!(cfg.bridge.settings.timeout_ms, 250);
        assert_eq!(cfg.muxes.len(), 2);
        assert_eq!(cfg.mux("mux0").unwrap().model, MuxModel::Pca9548a);
        assert_eq!(cfg.mux("mux1").unwrap().address.get(), 0x71);
        assert!(cfg.mux("mux2").is_none());
    }

    #[test]
    fn test_bridge_settings_default() {
        let cfg = parse_bus_config("[bridge]\npath = \"/dev/i2c-0\"\n", "buses.toml").unwrap();
        assert_eq!(cfg.bridge.settings, BridgeSettings::default());
        assert!(cfg.muxes.is_empty());
    }

    #[test]
    fn test_out_of_range_mux_address_rejected() {
        let err = parse_bus_config(
            "[bridge]\npath = \"/dev/i2c-0\"\n[[mux]]\nid = \"m\"\naddress = 0x90\n",
            "buses.toml",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::FormatError { .. }));
    }
}
