//! # COURIER Standard Library
//!
//! Transport drivers for the COURIER publish/subscribe bridge.
//!
//! ## Structure
//!
//! ```text
//! courier_library/
//! ── drivers/
//!    ── bus/        # Simulation bus segment, Linux i2c-dev
//!    ── network/    # Simulation broker and client
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use courier_core::{BusAdapter, BusConfig, TransportAdapter};
//! use courier_library::SimulationBus;
//!
//! let segment = SimulationBus::new();
//! let mut driver = segment.attach(0x10)?;
//! driver.init()?;
//! let mut bus = BusAdapter::from_config(BusConfig::new(0x10, 0x20), driver)?;
//! ```

pub mod drivers;

pub use drivers::*;
