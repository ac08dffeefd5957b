use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::{OutputFormat, SensorConfig};
use crate::messages::{Header, ReadingMessage};
use crate::sensors::SensorDriver;

const DEVICE_ID: &str = "envmon";
const DEFAULT_FREQUENCY_HZ: u32 = 2;

/// What one sensor task did before it stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub sensor_id: String,
    pub reads: u64,
    pub failures: u64,
}

/// Poll every sensor on its own thread at its configured rate.
///
/// All threads share whatever bridge the drivers were built on; the bridge
/// serializes their traffic. Returns once every task has run
/// `config.poll.cycles` times, so a zero cycle count polls forever.
pub fn run_sensor_tasks<'bus>(
    sensors: Vec<Box<dyn SensorDriver + 'bus>>,
    config: &SensorConfig,
) -> Vec<TaskReport> {
    thread::scope(|scope| {
        let handles: Vec<_> = sensors
            .into_iter()
            .map(|sensor| {
                let sensor_id = sensor.id().to_string();
                let frequency = config
                    .sensors
                    .iter()
                    .find(|s| s.id == sensor_id)
                    .and_then(|s| s.frequency)
                    .unwrap_or(DEFAULT_FREQUENCY_HZ);
                let handle = scope.spawn(move || poll_sensor(sensor, frequency, config));
                (sensor_id, handle)
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|(sensor_id, handle)| match handle.join() {
                Ok(report) => Some(report),
                Err(_) => {
                    error!("[{}] sensor task panicked", sensor_id);
                    None
                }
            })
            .collect()
    })
}

fn poll_sensor(mut sensor: Box<dyn SensorDriver + '_>, frequency: u32, config: &SensorConfig) -> TaskReport {
    let sensor_id = sensor.id().to_string();
    let period = Duration::from_secs_f64(1.0 / frequency.max(1) as f64);
    let cycles = config.poll.cycles;
    let mut report = TaskReport {
        sensor_id: sensor_id.clone(),
        reads: 0,
        failures: 0,
    };

    info!("[{}] Starting sensor task at {}Hz", sensor_id, frequency);
    let mut attempt = 0u64;
    loop {
        let started = Instant::now();
        attempt += 1;

        match sensor.read() {
            Ok(frame) => {
                report.reads += 1;
                let msg = ReadingMessage {
                    h: Header::new(DEVICE_ID.to_string(), sensor_id.clone(), report.reads),
                    data: frame,
                };
                publish(&msg, config.poll.format);
            }
            Err(e) => {
                report.failures += 1;
                warn!("[{}] Sensor read error: {}", sensor_id, e);
            }
        }

        if cycles > 0 && attempt >= cycles {
            break;
        }
        thread::sleep(period.saturating_sub(started.elapsed()));
    }

    report
}

fn publish(msg: &ReadingMessage, format: OutputFormat) {
    match format {
        OutputFormat::Log => info!("[{}] {}", msg.sensor_id(), msg.summary()),
        OutputFormat::Json => match msg.to_json() {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("[{}] Failed to encode reading: {}", msg.sensor_id(), e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sensor_config::parse_sensor_config;
    use crate::errors::{BusError, CommError, SensorResult};
    use crate::sensors::SensorDataFrame;
    use crate::bus::I2cAddress;

    /// Fails every other read
    struct Flaky {
        id: String,
        calls: u64,
    }

    impl SensorDriver for Flaky {
        fn init(&mut self) -> SensorResult<()> {
            Ok(())
        }

        fn read(&mut self) -> SensorResult<SensorDataFrame> {
            self.calls += 1;
            if self.calls % 2 == 0 {
                let address = I2cAddress::new(0x44).unwrap();
                return Err(CommError::Bus(BusError::Nack { address }).into());
            }
            Ok(SensorDataFrame {
                temperature: Some(20.0),
                ..Default::default()
            })
        }

        fn id(&self) -> &str {
            &self.id
        }
    }

    #[test]
    fn test_bounded_run_counts_reads_and_failures() {
        let cfg = parse_sensor_config(
            "[poll]\ncycles = 4\n[[sensor]]\nid = \"a\"\ndriver = \"x\"\naddress = 0x44\nfrequency = 1000\n",
            "sensors.toml",
        )
        .unwrap();
        let sensors: Vec<Box<dyn SensorDriver>> = vec![
            Box::new(Flaky { id: "a".to_string(), calls: 0 }),
            Box::new(Flaky { id: "b".to_string(), calls: 0 }),
        ];

        let started = Instant::now();
        let mut reports = run_sensor_tasks(sensors, &cfg);
        reports.sort_by(|a, b| a.sensor_id.cmp(&b.sensor_id));

        assert_eq!(
            reports,
            vec![
                TaskReport { sensor_id: "a".to_string(), reads: 2, failures: 2 },
                TaskReport { sensor_id: "b".to_string(), reads: 2, failures: 2 },
            ]
        );
        // "a" runs at 1 kHz, "b" at the 2 Hz default: three sleeps of 500 ms
        assert!(started.elapsed() >= Duration::from_millis(1400));
    }
}
