//! Bus drivers
//!
//! # Available Drivers
//!
//! - `SimulationBusDriver` - Always available, in-memory bus segment
//! - `LinuxI2cDriver` - Linux i2cdev interface (requires `i2c-hardware` feature)

mod simulation;

#[cfg(feature = "i2c-hardware")]
mod linux_i2c;

pub use simulation::{SimulationBus, SimulationBusDriver, SimulationBusPeer, Transmission};

#[cfg(feature = "i2c-hardware")]
pub use linux_i2c::{LinuxI2cConfig, LinuxI2cDriver};

use courier_core::error::CourierResult;
use courier_core::transport::{BusDriver, BusReceiveCallback, DriverStatus};

/// I2C driver backend selection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum I2cDriverBackend {
    #[default]
    Simulation,
    #[cfg(feature = "i2c-hardware")]
    Linux,
}

/// Type-erased I2C driver
pub enum I2cDriver {
    Simulation(SimulationBusDriver),
    #[cfg(feature = "i2c-hardware")]
    Linux(LinuxI2cDriver),
}

impl I2cDriver {
    /// `own_address` is only meaningful for the simulation backend; i2c-dev
    /// runs as bus master.
    pub fn new(backend: I2cDriverBackend, own_address: u8) -> Self {
        match backend {
            I2cDriverBackend::Simulation => Self::Simulation(SimulationBusDriver::new(own_address)),
            #[cfg(feature = "i2c-hardware")]
            I2cDriverBackend::Linux => Self::Linux(LinuxI2cDriver::new()),
        }
    }

    pub fn simulation(own_address: u8) -> Self {
        Self::Simulation(SimulationBusDriver::new(own_address))
    }

    // ========================================================================
    // Lifecycle methods
    // ========================================================================

    pub fn init(&mut self) -> CourierResult<()> {
        match self {
            Self::Simulation(d) => d.init(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.init(),
        }
    }

    pub fn shutdown(&mut self) -> CourierResult<()> {
        match self {
            Self::Simulation(d) => d.shutdown(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.shutdown(),
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            Self::Simulation(d) => d.is_available(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.is_available(),
        }
    }
}

impl BusDriver for I2cDriver {
    fn name(&self) -> &'static str {
        match self {
            Self::Simulation(d) => d.name(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.name(),
        }
    }

    fn begin_transmission(&mut self, address: u8) -> CourierResult<()> {
        match self {
            Self::Simulation(d) => d.begin_transmission(address),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.begin_transmission(address),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> CourierResult<usize> {
        match self {
            Self::Simulation(d) => d.write(bytes),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.write(bytes),
        }
    }

    fn end_transmission(&mut self) -> CourierResult<()> {
        match self {
            Self::Simulation(d) => d.end_transmission(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.end_transmission(),
        }
    }

    fn set_receive_callback(&mut self, callback: BusReceiveCallback) {
        match self {
            Self::Simulation(d) => d.set_receive_callback(callback),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.set_receive_callback(callback),
        }
    }

    fn status(&self) -> DriverStatus {
        match self {
            Self::Simulation(d) => d.status(),
            #[cfg(feature = "i2c-hardware")]
            Self::Linux(d) => d.status(),
        }
    }
}
