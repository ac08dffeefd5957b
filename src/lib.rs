// Public modules
pub mod bus;
pub mod config;
pub mod errors;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod sensors;

// Re-export commonly used types
pub use bus::{AddressedChannel, Bridge, BridgeSettings, DeviceCom, I2cAdapter, I2cAddress, I2cCom, MuxedChannel};
pub use config::{HubConfig, SensorConfig};
pub use errors::{BusError, CommError, ConfigError, SensorError, SensorResult};
pub use registry::init_all;
pub use scheduler::{run_sensor_tasks, TaskReport};

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::bus::LinuxI2CAdapter;
use crate::errors::RegistryResult;

/// Initialize tracing with default configuration
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// Run the EnvMon monitor with the configuration found in `config_path`
pub fn run_monitor(config_path: &str) -> Result<Vec<TaskReport>, Box<dyn std::error::Error>> {
    info!("[EnvMonHub] starting up...");

    let config = HubConfig::load(config_path)?;
    info!(
        "[config] loaded {} sensor(s) and {} mux(es)",
        config.sensors.sensors.len(),
        config.bus.muxes.len()
    );

    let adapter = LinuxI2CAdapter::new(&config.bus.bridge.path)?;
    let bridge = Bridge::open(adapter, config.bus.bridge.settings.clone())?;
    info!("[bridge] initialized {}", bridge.name());

    Ok(run_with_bridge(&config, &bridge)?)
}

/// Register and poll all configured sensors over an already opened bridge
pub fn run_with_bridge<A: I2cAdapter>(config: &HubConfig, bridge: &Bridge<A>) -> RegistryResult<Vec<TaskReport>> {
    let sensors = init_all(config, bridge)?;
    info!("[registry] sensors initialized");

    Ok(run_sensor_tasks(sensors, &config.sensors))
}
