use std::thread;
use std::time::Duration;

use tracing::debug;

use super::{SensorDataFrame, SensorDriver};
use crate::bus::I2cCom;
use crate::errors::{SensorError, SensorResult};

// Commands (MSB first)
const CMD_SOFT_RESET: [u8; 2] = [0x30, 0xA2];
const CMD_READ_STATUS: [u8; 2] = [0xF3, 0x2D];
const CMD_MEASURE_HIGH_REP: [u8; 2] = [0x24, 0x00];

const RESET_DELAY: Duration = Duration::from_millis(2);
// Max single-shot duration at high repeatability is 15.5 ms
const MEASURE_DELAY: Duration = Duration::from_millis(16);

const CRC_POLY: u8 = 0x31;
const CRC_INIT: u8 = 0xFF;

/// Sensirion SHT85 humidity and temperature sensor
pub struct Sht85<C> {
    id: String,
    com: C,
}

impl<C: I2cCom> Sht85<C> {
    pub fn new(id: String, com: C) -> Self {
        Self { id, com }
    }

    /// Read `words` CRC-protected 16-bit words
    fn read_words(&self, words: usize) -> SensorResult<Vec<u16>> {
        let raw = self.com.read(words * 3)?;
        raw.chunks_exact(3)
            .map(|chunk| {
                let expected = crc8(&chunk[..2]);
                if chunk[2] != expected {
                    return Err(SensorError::CrcMismatch {
                        sensor: self.id.clone(),
                        expected,
                        actual: chunk[2],
                    });
                }
                Ok(u16::from_be_bytes([chunk[0], chunk[1]]))
            })
            .collect()
    }
}

impl<C: I2cCom + Send> SensorDriver for Sht85<C> {
    fn init(&mut self) -> SensorResult<()> {
        self.com.write(&CMD_SOFT_RESET).map_err(|e| SensorError::InitError {
            sensor: self.id.clone(),
            reason: format!("soft reset failed: {}", e),
        })?;
        thread::sleep(RESET_DELAY);

        self.com.write(&CMD_READ_STATUS)?;
        let status = self.read_words(1)?[0];
        debug!("[{}] SHT85 at {} status {:#06x}", self.id, self.com.address(), status);
        Ok(())
    }

    fn read(&mut self) -> SensorResult<SensorDataFrame> {
        self.com.write(&CMD_MEASURE_HIGH_REP)?;
        // The bus is free for other devices while the sensor converts
        thread::sleep(MEASURE_DELAY);

        let words = self.read_words(2)?;
        Ok(SensorDataFrame {
            temperature: Some(convert_temperature(words[0])),
            humidity: Some(convert_humidity(words[1])),
            ..Default::default()
        })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// CRC-8, polynomial 0x31, init 0xFF
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(CRC_INIT, |mut crc, byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
        }
        crc
    })
}

fn convert_temperature(raw: u16) -> f32 {
    -45.0 + 175.0 * raw as f32 / 65535.0
}

fn convert_humidity(raw: u16) -> f32 {
    100.0 * raw as f32 / 65535.0
}
