use serde::Serialize;

use crate::bus::I2cCom;
use crate::config::SensorEntry;
use crate::errors::{SensorError, SensorResult};

#[cfg(feature = "ad799x")]
pub mod ad799x;
#[cfg(feature = "sht85")]
pub mod sht85;

/// One conversion from an ADC input
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdcSample {
    pub channel: u8,
    /// Raw conversion result
    pub counts: u16,
    pub volts: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SensorDataFrame {
    /// Degrees Celsius
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Relative humidity in percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adc: Vec<AdcSample>,
}

pub trait SensorDriver: Send {
    fn init(&mut self) -> SensorResult<()>;
    fn read(&mut self) -> SensorResult<SensorDataFrame>;
    fn id(&self) -> &str;
}

/// Build the driver named by `entry.driver` on top of `com`
pub fn create_sensor_driver<'bus, C>(
    entry: &SensorEntry,
    com: C,
) -> SensorResult<Box<dyn SensorDriver + 'bus>>
where
    C: I2cCom + Send + 'bus,
{
    let id = entry.id.clone();
    match entry.driver.as_str() {
        #[cfg(feature = "sht85")]
        "sht85" => Ok(Box::new(sht85::Sht85::new(id, com))),
        #[cfg(feature = "ad799x")]
        "ad7998" | "ad7997" | "ad7994" | "ad7993" => {
            let model = ad799x::Ad799xModel::from_driver(&entry.driver)
                .ok_or_else(|| SensorError::UnsupportedDriver { driver: entry.driver.clone() })?;
            let vref = entry.vref.unwrap_or(ad799x::DEFAULT_VREF);
            let inputs = entry.channels.clone().unwrap_or_else(|| vec![0]);
            Ok(Box::new(ad799x::Ad799x::new(id, model, vref, inputs, com)?))
        }
        _ => Err(SensorError::UnsupportedDriver { driver: entry.driver.clone() }),
    }
}
