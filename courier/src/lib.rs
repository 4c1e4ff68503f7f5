//! # COURIER - transport-agnostic publish/subscribe bridge
//!
//! COURIER moves identified messages between bounded in-memory buffers and
//! the transports of a small controller: an addressed bus (I2C-style) or a
//! broker-based network client (MQTT-style).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let broker = SimulationBroker::new();
//!     let config = NetworkConfig::new("rover").with_topics("rover/out/", "rover/in/");
//!     let mut net = NetworkAdapter::setup(config, broker.client())?;
//!     let commands = net.register_subscription(1u16.into(), 8, 64, OverflowPolicy::RejectNewest)?;
//!     net.start()?;
//!
//!     loop {
//!         net.poll()?;
//!         while let Some(command) = commands.dequeue() {
//!             net.send(&2u16.into(), &command.payload)?;
//!         }
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! - **Bounded buffers** with reject-newest or evict-oldest overflow
//! - **Pluggable framing**: tagged binary, JSON document, topic suffix
//! - **Automatic reconnection** with subscription restore
//! - **Simulation drivers** for tests, Linux i2c-dev behind `i2c-hardware`

// Re-export core components
pub use courier_core::{self, *};

// Re-export driver library with alias
pub use courier_library as library;

pub use serde;

/// The COURIER prelude
///
/// Just add `use courier::prelude::*;` to get started.
pub mod prelude {
    // ============================================
    // Buffers & Subscriptions
    // ============================================
    pub use courier_core::buffer::{Message, MessageBuffer, OverflowPolicy};
    pub use courier_core::identity::{IdentityKind, IdentityRef, MessageIdentity};
    pub use courier_core::registry::{BufferHandle, DispatchOutcome, SubscriberRegistry};

    // ============================================
    // Adapters
    // ============================================
    pub use courier_core::adapter::{AdapterMetrics, BusAdapter, NetworkAdapter, TransportAdapter};
    pub use courier_core::supervisor::{ConnectionState, ConnectionSupervisor};

    // ============================================
    // Framing
    // ============================================
    pub use courier_core::framing::{FramingCodec, FramingKind, JsonPayloadCodec, PayloadCodec};

    // ============================================
    // Configuration
    // ============================================
    pub use courier_core::config::{BusConfig, CourierConfig, NetworkConfig, SubscriptionConfig};

    // ============================================
    // Drivers
    // ============================================
    pub use courier_core::transport::{BusDriver, DriverStatus, NetworkClient};
    pub use courier_library::drivers::{
        I2cDriver, I2cDriverBackend, SimulationBroker, SimulationBus, SimulationBusDriver,
        SimulationNetworkClient,
    };

    #[cfg(feature = "i2c-hardware")]
    pub use courier_library::drivers::LinuxI2cDriver;

    // ============================================
    // Error Types
    // ============================================
    pub use courier_core::error::{CourierError, CourierResult};
    pub type Result<T> = CourierResult<T>;

    // ============================================
    // Common Std Types
    // ============================================
    pub use std::sync::Arc;
    pub use std::time::Duration;

    // ============================================
    // Common Traits
    // ============================================
    pub use serde::{Deserialize, Serialize};

    // Re-export anyhow for error handling
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}
