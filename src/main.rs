use std::process::ExitCode;

use envmon_hub::{init_tracing, run_monitor};
use tracing::{error, info};

/// Default configuration directory (the EnvMon board layout)
const CONFIG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config");

fn main() -> ExitCode {
    init_tracing();

    // Load configuration from CONFIG_PATH or the bundled board config
    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| CONFIG_DIR.to_string());
    info!("[main] Configuration path: {}", config_path);

    match run_monitor(&config_path) {
        Ok(reports) => {
            for r in reports {
                info!("[{}] {} reads, {} failures", r.sensor_id, r.reads, r.failures);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("[main] {}", e);
            ExitCode::FAILURE
        }
    }
}
