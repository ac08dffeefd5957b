use std::fmt;

use serde::Deserialize;

use crate::errors::{ConfigError, ConfigResult};

/// A 7-bit I2C device address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "u8")]
pub struct I2cAddress(u8);

impl I2cAddress {
    pub const MAX: u8 = 0x7F;

    pub fn new(value: u8) -> ConfigResult<Self> {
        if value > Self::MAX {
            return Err(ConfigError::InvalidAddress { value });
        }
        Ok(Self(value))
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for I2cAddress {
    type Error = ConfigError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<I2cAddress> for u16 {
    fn from(address: I2cAddress) -> Self {
        address.0 as u16
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Supported channel multiplexer parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MuxModel {
    /// 8 channels, one enable bit per channel. Also covers the TCA9548A.
    #[default]
    #[serde(alias = "tca9548a")]
    Pca9548a,
    /// 4 channels, one enable bit per channel
    #[serde(alias = "tca9546a")]
    Pca9546a,
    /// 4 channels, enable bit 2 plus a channel number
    Pca9544a,
}

impl MuxModel {
    pub fn channels(self) -> u8 {
        match self {
            MuxModel::Pca9548a => 8,
            MuxModel::Pca9546a | MuxModel::Pca9544a => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MuxModel::Pca9548a => "PCA9548A",
            MuxModel::Pca9546a => "PCA9546A",
            MuxModel::Pca9544a => "PCA9544A",
        }
    }

    fn control_byte(self, channel: u8) -> u8 {
        match self {
            MuxModel::Pca9548a | MuxModel::Pca9546a => 1 << channel,
            MuxModel::Pca9544a => 0x04 | channel,
        }
    }
}

/// A multiplexer output, validated against the part it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuxPort {
    model: MuxModel,
    index: u8,
}

impl MuxPort {
    pub fn new(model: MuxModel, index: u8) -> ConfigResult<Self> {
        if index >= model.channels() {
            return Err(ConfigError::InvalidChannel {
                channel: index,
                model: model.name().to_string(),
                channels: model.channels(),
            });
        }
        Ok(Self { model, index })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn model(&self) -> MuxModel {
        self.model
    }

    /// Control byte that connects this output to the upstream bus
    pub fn select_byte(&self) -> u8 {
        self.model.control_byte(self.index)
    }
}
