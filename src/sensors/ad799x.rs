use tracing::debug;

use super::{AdcSample, SensorDataFrame, SensorDriver};
use crate::bus::I2cCom;
use crate::errors::{SensorError, SensorResult};

pub const DEFAULT_VREF: f64 = 2.5;

// Address pointer bits
const READ_SINGLE: u8 = 0x80;
const CHANNEL_SHIFT: u8 = 4;
const RESULT_MASK: u16 = 0x0FFF;

/// Supported members of the AD799x I2C ADC family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ad799xModel {
    Ad7993,
    Ad7994,
    Ad7997,
    Ad7998,
}

impl Ad799xModel {
    pub fn from_driver(name: &str) -> Option<Self> {
        match name {
            "ad7993" => Some(Ad799xModel::Ad7993),
            "ad7994" => Some(Ad799xModel::Ad7994),
            "ad7997" => Some(Ad799xModel::Ad7997),
            "ad7998" => Some(Ad799xModel::Ad7998),
            _ => None,
        }
    }

    pub fn inputs(self) -> u8 {
        match self {
            Ad799xModel::Ad7993 | Ad799xModel::Ad7994 => 4,
            Ad799xModel::Ad7997 | Ad799xModel::Ad7998 => 8,
        }
    }

    pub fn resolution_bits(self) -> u8 {
        match self {
            Ad799xModel::Ad7993 | Ad799xModel::Ad7997 => 10,
            Ad799xModel::Ad7994 | Ad799xModel::Ad7998 => 12,
        }
    }

    /// Address pointer byte that starts a conversion on `input`
    fn command(self, input: u8) -> u8 {
        match self {
            Ad799xModel::Ad7993 | Ad799xModel::Ad7994 => (1 << input) << CHANNEL_SHIFT,
            Ad799xModel::Ad7997 | Ad799xModel::Ad7998 => READ_SINGLE | (input << CHANNEL_SHIFT),
        }
    }
}

/// AD799x multi-channel ADC in command mode
pub struct Ad799x<C> {
    id: String,
    model: Ad799xModel,
    vref: f64,
    inputs: Vec<u8>,
    com: C,
}

impl<C: I2cCom> Ad799x<C> {
    pub fn new(id: String, model: Ad799xModel, vref: f64, inputs: Vec<u8>, com: C) -> SensorResult<Self> {
        if inputs.is_empty() {
            return Err(SensorError::ConfigError {
                sensor: id,
                reason: "at least one input must be sampled".to_string(),
            });
        }
        if let Some(bad) = inputs.iter().find(|&&input| input >= model.inputs()) {
            return Err(SensorError::ConfigError {
                sensor: id,
                reason: format!("{:?} has no input {}", model, bad),
            });
        }
        if vref.is_nan() || vref <= 0.0 {
            return Err(SensorError::ConfigError {
                sensor: id,
                reason: format!("reference voltage must be positive, got {}", vref),
            });
        }
        Ok(Self { id, model, vref, inputs, com })
    }

    /// Raw conversion result for one input
    pub fn read_count(&self, input: u8) -> SensorResult<u16> {
        let raw = self.com.write_read(&[self.model.command(input)], 2)?;
        let word = u16::from_be_bytes([raw[0], raw[1]]) & RESULT_MASK;
        Ok(word >> (12 - self.model.resolution_bits()))
    }

    /// Conversion result for one input in volts
    pub fn read_volts(&self, input: u8) -> SensorResult<f64> {
        Ok(self.to_volts(self.read_count(input)?))
    }

    fn to_volts(&self, counts: u16) -> f64 {
        counts as f64 * self.vref / (1u32 << self.model.resolution_bits()) as f64
    }
}

impl<C: I2cCom + Send> SensorDriver for Ad799x<C> {
    fn init(&mut self) -> SensorResult<()> {
        // A conversion doubles as a presence check; command mode needs no setup
        let first = self.inputs.first().copied().unwrap_or(0);
        let counts = self.read_count(first).map_err(|e| SensorError::InitError {
            sensor: self.id.clone(),
            reason: e.to_string(),
        })?;
        debug!(
            "[{}] {:?} at {} responding, input {} = {} counts",
            self.id,
            self.model,
            self.com.address(),
            first,
            counts
        );
        Ok(())
    }

    fn read(&mut self) -> SensorResult<SensorDataFrame> {
        let adc = self
            .inputs
            .iter()
            .map(|&channel| {
                let counts = self.read_count(channel)?;
                Ok(AdcSample {
                    channel,
                    counts,
                    volts: self.to_volts(counts),
                })
            })
            .collect::<SensorResult<Vec<_>>>()?;
        Ok(SensorDataFrame {
            adc,
            ..Default::default()
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}
