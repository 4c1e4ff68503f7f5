//! Linux I2C driver
//!
//! Master-side I2C through the Linux i2c-dev interface.
//! Requires the `i2c-hardware` feature.
//!
//! i2c-dev cannot act as a bus target, so frames are only ever written. The
//! receive callback is stored but never raised by this driver.

use courier_core::error::{CourierError, CourierResult};
use courier_core::transport::{BusDriver, BusReceiveCallback, DriverStatus};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;

/// Linux I2C configuration
#[derive(Debug, Clone)]
pub struct LinuxI2cConfig {
    /// I2C device path (e.g., "/dev/i2c-1")
    pub device: String,
}

impl Default for LinuxI2cConfig {
    fn default() -> Self {
        Self {
            device: "/dev/i2c-1".to_string(),
        }
    }
}

// I2C ioctl constants
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// Linux I2C bus driver using i2cdev
pub struct LinuxI2cDriver {
    config: LinuxI2cConfig,
    status: DriverStatus,
    device: Option<File>,
    current_addr: Option<u8>,
    frame: Vec<u8>,
    in_transmission: bool,
    callback: Option<BusReceiveCallback>,
}

impl LinuxI2cDriver {
    pub fn new() -> Self {
        Self::with_config(LinuxI2cConfig::default())
    }

    pub fn with_config(config: LinuxI2cConfig) -> Self {
        Self {
            config,
            status: DriverStatus::Uninitialized,
            device: None,
            current_addr: None,
            frame: Vec::new(),
            in_transmission: false,
            callback: None,
        }
    }

    /// Open the i2c-dev device node
    pub fn init(&mut self) -> CourierResult<()> {
        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.config.device)
            .map_err(|e| {
                self.status = DriverStatus::Error(e.to_string());
                CourierError::driver(format!(
                    "Failed to open I2C device {}: {}",
                    self.config.device, e
                ))
            })?;

        self.device = Some(device);
        self.current_addr = None;
        self.status = DriverStatus::Ready;
        log::info!("Opened I2C device {}", self.config.device);
        Ok(())
    }

    pub fn shutdown(&mut self) -> CourierResult<()> {
        self.device = None;
        self.callback = None;
        self.status = DriverStatus::Shutdown;
        Ok(())
    }

    pub fn is_available(&self) -> bool {
        self.device.is_some()
    }

    /// Point subsequent writes at `addr`
    fn set_address(&mut self, addr: u8) -> CourierResult<()> {
        if self.current_addr == Some(addr) {
            return Ok(());
        }

        let device = self
            .device
            .as_ref()
            .ok_or_else(|| CourierError::driver("I2C device not initialized"))?;

        // SAFETY: the fd belongs to an open i2c-dev node for the lifetime of `device`
        let ret = unsafe { libc::ioctl(device.as_raw_fd(), I2C_SLAVE, addr as libc::c_ulong) };

        if ret < 0 {
            return Err(CourierError::driver(format!(
                "Failed to set I2C address 0x{:02x}: {}",
                addr,
                std::io::Error::last_os_error()
            )));
        }

        self.current_addr = Some(addr);
        Ok(())
    }
}

impl Default for LinuxI2cDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for LinuxI2cDriver {
    fn name(&self) -> &'static str {
        "linux-i2c"
    }

    fn begin_transmission(&mut self, address: u8) -> CourierResult<()> {
        self.set_address(address)?;
        self.frame.clear();
        self.in_transmission = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> CourierResult<usize> {
        if !self.in_transmission {
            return Err(CourierError::driver("write outside a transmission"));
        }
        self.frame.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn end_transmission(&mut self) -> CourierResult<()> {
        if !self.in_transmission {
            return Err(CourierError::driver("no transmission in progress"));
        }
        self.in_transmission = false;

        let device = self
            .device
            .as_mut()
            .ok_or_else(|| CourierError::driver("I2C device not initialized"))?;
        device
            .write_all(&self.frame)
            .map_err(|e| CourierError::driver(format!("I2C write failed: {}", e)))?;

        self.status = DriverStatus::Running;
        Ok(())
    }

    fn set_receive_callback(&mut self, callback: BusReceiveCallback) {
        log::warn!(
            "{} is master-only; inbound frames will not be delivered",
            self.config.device
        );
        self.callback = Some(callback);
    }

    fn status(&self) -> DriverStatus {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_device_fails_init() {
        let mut driver = LinuxI2cDriver::with_config(LinuxI2cConfig {
            device: "/dev/does-not-exist-i2c".to_string(),
        });
        assert!(driver.init().is_err());
        assert!(matches!(driver.status(), DriverStatus::Error(_)));
        assert!(!driver.is_available());
        assert!(driver.begin_transmission(0x20).is_err());
    }

    #[test]
    fn test_write_requires_transmission() {
        let mut driver = LinuxI2cDriver::new();
        assert!(driver.write(&[1]).is_err());
        assert!(driver.end_transmission().is_err());
    }
}
