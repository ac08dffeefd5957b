use thiserror::Error;
use crate::bus::I2cAddress;

/// Failures reported by an adapter for a single bus operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("device {address} did not acknowledge")]
    Nack { address: I2cAddress },

    #[error("transaction to {address} timed out")]
    Timeout { address: I2cAddress },

    #[error("bus transfer to {address} failed: {reason}")]
    Transfer { address: I2cAddress, reason: String },

    #[error("adapter does not support {what}")]
    Unsupported { what: String },
}

impl BusError {
    /// Address of the device the failed operation was aimed at, if any
    pub fn address(&self) -> Option<I2cAddress> {
        match self {
            BusError::Nack { address }
            | BusError::Timeout { address }
            | BusError::Transfer { address, .. } => Some(*address),
            BusError::Unsupported { .. } => None,
        }
    }
}

/// Adapter bring-up errors. The process cannot continue without a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("failed to open I2C adapter '{path}': {reason}")]
    Open { path: String, reason: String },

    #[error("failed to configure I2C adapter '{adapter}': {source}")]
    Configure {
        adapter: String,
        #[source]
        source: BusError,
    },
}

/// Errors surfaced through the communication capability used by drivers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("mux {mux} failed to select channel {channel}: {source}")]
    MuxSelect {
        mux: I2cAddress,
        channel: u8,
        #[source]
        source: BusError,
    },

    #[error("device {target} behind mux {mux} channel {channel} failed: {source}")]
    MuxTarget {
        mux: I2cAddress,
        channel: u8,
        target: I2cAddress,
        #[source]
        source: BusError,
    },
}

impl CommError {
    /// The underlying bus failure, whichever stage produced it
    pub fn bus_error(&self) -> &BusError {
        match self {
            CommError::Bus(source)
            | CommError::MuxSelect { source, .. }
            | CommError::MuxTarget { source, .. } => source,
        }
    }

    pub fn is_select_failure(&self) -> bool {
        matches!(self, CommError::MuxSelect { .. })
    }
}

/// Sensor driver errors
#[derive(Error, Debug)]
pub enum SensorError {
    #[error("I2C communication failed: {0}")]
    Comm(#[from] CommError),

    #[error("Sensor '{sensor}' initialization failed: {reason}")]
    InitError { sensor: String, reason: String },

    #[error("Sensor '{sensor}' CRC mismatch: expected {expected:#04x}, got {actual:#04x}")]
    CrcMismatch { sensor: String, expected: u8, actual: u8 },

    #[error("Invalid sensor configuration for '{sensor}': {reason}")]
    ConfigError { sensor: String, reason: String },

    #[error("Unsupported sensor driver: '{driver}'")]
    UnsupportedDriver { driver: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I2C address {value:#04x} is outside the 7-bit range")]
    InvalidAddress { value: u8 },

    #[error("mux channel {channel} is out of range for {model} ({channels} channels)")]
    InvalidChannel { channel: u8, model: String, channels: u8 },

    #[error("Failed to load configuration from '{path}': {source}")]
    LoadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration format in '{path}': {source}")]
    FormatError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Registry and initialization errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Bridge initialization failed: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid hub configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to create driver for sensor '{sensor}': {source}")]
    DriverCreationError {
        sensor: String,
        #[source]
        source: SensorError,
    },

    #[error("Sensor '{sensor}' registration failed: {source}")]
    RegistrationError {
        sensor: String,
        #[source]
        source: SensorError,
    },
}

/// Result type aliases for convenience
pub type BusResult<T> = Result<T, BusError>;
pub type CommResult<T> = Result<T, CommError>;
pub type SensorResult<T> = Result<T, SensorError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type RegistryResult<T> = Result<T, RegistryError>;
