//! Shared I2C bus access.
//!
//! One [`Bridge`] owns the physical link. [`AddressedChannel`]s bind a device
//! address to it, and [`MuxedChannel`]s route through a channel multiplexer
//! first. Drivers see both through [`I2cCom`].

pub mod adapter;
pub mod address;
pub mod bridge;
pub mod channel;
pub mod com;
pub mod i2c;
pub mod mux;
pub mod sim;

pub use adapter::I2cAdapter;
pub use address::{I2cAddress, MuxModel, MuxPort};
pub use bridge::{BitOrder, Bridge, BridgeSettings, BusSpeed, BusTransaction, Protocol};
pub use channel::AddressedChannel;
pub use com::{DeviceCom, I2cCom};
pub use i2c::LinuxI2CAdapter;
pub use mux::MuxedChannel;
pub use sim::SimAdapter;
