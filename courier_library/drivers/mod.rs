//! Transport drivers for COURIER
//!
//! Drivers implement the transport traits from `courier_core::transport` and
//! are handed to a `BusAdapter` or `NetworkAdapter`.
//!
//! # Architecture
//!
//! ```text
//! Adapters (courier_core::adapter)
//!   │
//!   └── use transport traits (courier_core::transport)
//!           │
//!           ├── Simulation drivers (always available)
//!           └── Hardware drivers (feature-gated)
//! ```
//!
//! # Adding a New Driver
//!
//! 1. Create a new module under `bus/` or `network/`
//! 2. Implement `BusDriver` or `NetworkClient`
//! 3. Add a feature gate if hardware-specific
//! 4. Re-export from this module

pub mod bus;
pub mod network;

pub use bus::{
    I2cDriver, I2cDriverBackend, SimulationBus, SimulationBusDriver, SimulationBusPeer,
    Transmission,
};
#[cfg(feature = "i2c-hardware")]
pub use bus::{LinuxI2cConfig, LinuxI2cDriver};
pub use network::{
    PublishedMessage, SimulationBroker, SimulationClientHandle, SimulationNetworkClient,
};
