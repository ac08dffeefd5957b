use serde::Serialize;

use crate::sensors::SensorDataFrame;

/// Header metadata common to all readings
#[derive(Serialize, Clone, Debug)]
pub struct Header {
    /// Unique device identifier
    pub device_id: String,
    /// Sensor identifier from the configuration (e.g., "sht85_0", "adc")
    pub sensor_id: String,
    /// Sequence number for message ordering
    pub seq: u64,
    /// UTC timestamp in nanoseconds
    pub t_utc_ns: u64,
    /// Message schema version for evolution
    pub schema_v: u16,
}

impl Header {
    /// Create a new header stamped with the current time
    pub fn new(device_id: String, sensor_id: String, seq: u64) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now_utc = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;

        Self {
            device_id,
            sensor_id,
            seq,
            t_utc_ns: now_utc,
            schema_v: 1,
        }
    }
}

/// One successful sensor read
#[derive(Serialize, Clone, Debug)]
pub struct ReadingMessage {
    pub h: Header,
    #[serde(flatten)]
    pub data: SensorDataFrame,
}

impl ReadingMessage {
    pub fn sensor_id(&self) -> &str {
        &self.h.sensor_id
    }

    /// Single-line JSON, suitable for JSON-lines output
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Human readable summary for the log
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(t) = self.data.temperature {
            parts.push(format!("Temp = {:.2} deg-C", t));
        }
        if let Some(rh) = self.data.humidity {
            parts.push(format!("humidity = {:.2} %", rh));
        }
        for sample in &self.data.adc {
            parts.push(format!(
                "ADC[channel {}]: {} ({:.4} Volts)",
                sample.channel, sample.counts, sample.volts
            ));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::AdcSample;

    #[test]
    fn test_header_creation() {
        let header = Header::new("envmon".to_string(), "sht85_0".to_string(), 42);

        assert_eq!(header.device_id, "envmon");
        assert_eq!(header.sensor_id, "sht85_0");
        assert_eq!(header.seq, 42);
        assert_eq!(header.schema_v, 1);
        assert!(header.t_utc_ns > 0);
    }

    #[test]
    fn test_reading_serialization() {
        let msg = ReadingMessage {
            h: Header::new("envmon".to_string(), "sht85_1".to_string(), 1),
            data: SensorDataFrame {
                temperature: Some(21.5),
                humidity: Some(40.25),
                ..Default::default()
            },
        };

        let json = msg.to_json().unwrap();
        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["h"]["sensor_id"], "sht85_1");
        assert_eq!(value["temperature"], 21.5);
        assert_eq!(value["humidity"], 40.25);
        assert!(value.get("adc").is_none());
    }

    #[test]
    fn test_summary_lists_adc_channels() {
        let msg = ReadingMessage {
            h: Header::new("envmon".to_string(), "adc".to_string(), 3),
            data: SensorDataFrame {
                adc: vec![AdcSample { channel: 4, counts: 2048, volts: 1.25 }],
                ..Default::default()
            },
        };
        assert_eq!(msg.summary(), "ADC[channel 4]: 2048 (1.2500 Volts)");
    }
}
