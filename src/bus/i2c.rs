#[cfg(all(feature = "linux-hal", target_os = "linux"))]
use i2cdev::core::{I2CDevice, I2CMessage, I2CTransfer};
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError, LinuxI2CMessage};
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
use std::os::unix::io::{AsRawFd, RawFd};
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
use tracing::debug;

use crate::bus::{BitOrder, BridgeSettings, I2cAdapter, I2cAddress};
use crate::errors::{BridgeError, BusError, BusResult};

#[cfg(all(feature = "linux-hal", target_os = "linux"))]
const ENXIO: i32 = 6;
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
const ETIMEDOUT: i32 = 110;
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
const EREMOTEIO: i32 = 121;

/// i2c-dev ioctl setting the adapter timeout, in units of 10 ms
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
const I2C_TIMEOUT: libc::c_ulong = 0x0702;

/// Adapter backed by a Linux `i2c-dev` node, e.g. `/dev/i2c-1`
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
pub struct LinuxI2CAdapter {
    device: LinuxI2CDevice,
    path: String,
}

#[cfg(not(all(feature = "linux-hal", target_os = "linux")))]
pub struct LinuxI2CAdapter {
    path: String,
}

/// Map an i2c-dev failure onto the bus error taxonomy
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
fn bus_error(address: I2cAddress, err: LinuxI2CError) -> BusError {
    let err = std::io::Error::from(err);
    match err.raw_os_error() {
        Some(ENXIO) | Some(EREMOTEIO) => BusError::Nack { address },
        Some(ETIMEDOUT) => BusError::Timeout { address },
        _ if err.kind() == std::io::ErrorKind::TimedOut => BusError::Timeout { address },
        _ => BusError::Transfer {
            address,
            reason: err.to_string(),
        },
    }
}

/// Convert a millisecond timeout to i2c-dev ticks, rounding up
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
fn timeout_ticks(timeout_ms: u64) -> libc::c_ulong {
    let ticks = timeout_ms.div_ceil(10).max(1);
    libc::c_ulong::try_from(ticks).unwrap_or(libc::c_ulong::MAX)
}

/// Take a non-blocking exclusive lock on the adapter node so a second
/// bridge on the same adapter fails to open
#[cfg(all(feature = "linux-hal", target_os = "linux"))]
fn lock_exclusive(fd: RawFd) -> std::io::Result<()> {
    // SAFETY: `fd` is an open descriptor owned by the caller for the duration of the call.
    let rc = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

fn check_bit_order(settings: &BridgeSettings) -> BusResult<()> {
    match settings.bit_order {
        BitOrder::MsbFirst => Ok(()),
        BitOrder::LsbFirst => Err(BusError::Unsupported {
            what: "LSB-first transfers on i2c-dev".to_string(),
        }),
    }
}

#[cfg(all(feature = "linux-hal", target_os = "linux"))]
impl LinuxI2CAdapter {
    pub fn new(path: &str) -> Result<Self, BridgeError> {
        let device = LinuxI2CDevice::new(path, 0).map_err(|e| BridgeError::Open {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        lock_exclusive(device.as_raw_fd()).map_err(|e| BridgeError::Open {
            path: path.to_string(),
            reason: format!("adapter is already in use: {}", e),
        })?;
        Ok(Self {
            device,
            path: path.to_string(),
        })
    }

    fn target(&mut self, address: I2cAddress) -> BusResult<()> {
        self.device
            .set_slave_address(address.into())
            .map_err(|e| bus_error(address, e))
    }
}

#[cfg(all(feature = "linux-hal", target_os = "linux"))]
impl I2cAdapter for LinuxI2CAdapter {
    fn describe(&self) -> String {
        format!("i2c-dev {}", self.path)
    }

    fn configure(&mut self, settings: &BridgeSettings) -> BusResult<()> {
        check_bit_order(settings)?;

        let ticks = timeout_ticks(settings.timeout_ms);
        // SAFETY: I2C_TIMEOUT takes its argument by value and the descriptor is owned by `self.device`.
        let rc = unsafe { libc::ioctl(self.device.as_raw_fd(), I2C_TIMEOUT as _, ticks) };
        if rc < 0 {
            return Err(BusError::Unsupported {
                what: format!(
                    "setting a {} ms timeout: {}",
                    settings.timeout_ms,
                    std::io::Error::last_os_error()
                ),
            });
        }

        // The clock rate is fixed by the kernel bus driver
        debug!(
            "[i2c] {} timeout {} ms; clock is kernel-configured, requested {} Hz",
            self.path,
            settings.timeout_ms,
            settings.speed.hz()
        );
        Ok(())
    }

    fn write(&mut self, address: I2cAddress, bytes: &[u8]) -> BusResult<()> {
        self.target(address)?;
        self.device.write(bytes).map_err(|e| bus_error(address, e))
    }

    fn read(&mut self, address: I2cAddress, buf: &mut [u8]) -> BusResult<()> {
        self.target(address)?;
        self.device.read(buf).map_err(|e| bus_error(address, e))
    }

    fn write_read(&mut self, address: I2cAddress, bytes: &[u8], buf: &mut [u8]) -> BusResult<()> {
        self.target(address)?;
        let mut messages = [LinuxI2CMessage::write(bytes), LinuxI2CMessage::read(buf)];
        self.device
            .transfer(&mut messages)
            .map(|_| ())
            .map_err(|e| bus_error(address, e))
    }
}

#[cfg(not(all(feature = "linux-hal", target_os = "linux")))]
impl LinuxI2CAdapter {
    pub fn new(path: &str) -> Result<Self, BridgeError> {
        Err(BridgeError::Open {
            path: path.to_string(),
            reason: "i2c-dev is only supported on Linux with the linux-hal feature".to_string(),
        })
    }
}

#[cfg(not(all(feature = "linux-hal", target_os = "linux")))]
impl I2cAdapter for LinuxI2CAdapter {
    fn describe(&self) -> String {
        format!("i2c-dev {} (unavailable)", self.path)
    }

    fn configure(&mut self, settings: &BridgeSettings) -> BusResult<()> {
        check_bit_order(settings)
    }

    fn write(&mut self, _address: I2cAddress, _bytes: &[u8]) -> BusResult<()> {
        Err(BusError::Unsupported {
            what: "i2c-dev on this platform".to_string(),
        })
    }

    fn read(&mut self, _address: I2cAddress, _buf: &mut [u8]) -> BusResult<()> {
        Err(BusError::Unsupported {
            what: "i2c-dev on this platform".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lsb_first_is_rejected() {
        let settings = BridgeSettings {
            bit_order: BitOrder::LsbFirst,
            ..Default::default()
        };
        assert!(matches!(
            check_bit_order(&settings),
            Err(BusError::Unsupported { .. })
        ));
        assert!(check_bit_order(&BridgeSettings::default()).is_ok());
    }

    #[test]
    fn test_missing_device_node_fails_open() {
        let err = LinuxI2CAdapter::new("/dev/i2c-does-not-exist").err().unwrap();
        assert!(matches!(err, BridgeError::Open { .. }));
    }

    #[cfg(all(feature = "linux-hal", target_os = "linux"))]
    #[test]
    fn test_errno_maps_to_bus_error() {
        let address = I2cAddress::new(0x44).unwrap();
        assert_eq!(
            bus_error(address, LinuxI2CError::Errno(ENXIO)),
            BusError::Nack { address }
        );
        assert_eq!(
            bus_error(address, LinuxI2CError::Errno(EREMOTEIO)),
            BusError::Nack { address }
        );
        assert_eq!(
            bus_error(address, LinuxI2CError::Errno(ETIMEDOUT)),
            BusError::Timeout { address }
        );
        assert!(matches!(
            bus_error(address, LinuxI2CError::Errno(libc::EIO)),
            BusError::Transfer { .. }
        ));
    }

    #[cfg(all(feature = "linux-hal", target_os = "linux"))]
    #[test]
    fn test_timeout_rounds_up_to_ticks() {
        assert_eq!(timeout_ticks(100), 10);
        assert_eq!(timeout_ticks(105), 11);
        assert_eq!(timeout_ticks(1), 1);
        assert_eq!(timeout_ticks(0), 1);
    }

    #[cfg(all(feature = "linux-hal", target_os = "linux"))]
    #[test]
    fn test_second_open_of_locked_node_fails() {
        let path = std::env::temp_dir().join(format!("envmon-hub-lock-{}", std::process::id()));
        let first = std::fs::File::create(&path).unwrap();
        let second = std::fs::File::open(&path).unwrap();

        lock_exclusive(first.as_raw_fd()).unwrap();
        let err = lock_exclusive(second.as_raw_fd()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EWOULDBLOCK));

        drop(first);
        lock_exclusive(second.as_raw_fd()).unwrap();
        drop(second);
        let _ = std::fs::remove_file(&path);
    }
}
