//! # COURIER Core
//!
//! Transport-agnostic publish/subscribe bridge for small controllers.
//!
//! Inbound bytes from a bus peripheral or a network client are decoded into
//! a message identity, matched against registered subscriptions and stored
//! in bounded buffers that application code drains from its main loop.
//! Outbound payloads are framed with an identity and handed to the transport.
//!
//! - **Buffer**: bounded FIFO with a configurable overflow policy
//! - **Registry**: identity to buffer bindings, sealed once traffic flows
//! - **Framing**: pluggable wire codecs (tagged, JSON, topic)
//! - **Supervisor**: connection recovery for networked transports
//! - **Adapter**: bus and network adapters wiring it all together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier_core::{BusAdapter, BusConfig, BusDriver, OverflowPolicy, TransportAdapter};
//!
//! fn run(driver: impl BusDriver) -> courier_core::CourierResult<()> {
//!     let mut bus = BusAdapter::from_config(BusConfig::new(0x10, 0x20), driver)?;
//!     let temps = bus.register_subscription(7u16.into(), 4, 32, OverflowPolicy::EvictOldest)?;
//!     bus.start()?;
//!
//!     loop {
//!         bus.poll()?;
//!         while let Some(message) = temps.dequeue() {
//!             bus.send(&8u16.into(), &message.payload)?;
//!         }
//!     }
//! }
//! ```

pub mod adapter;
pub mod buffer;
pub mod config;
pub mod error;
pub mod framing;
pub mod identity;
pub mod registry;
pub mod supervisor;
pub mod transport;

pub use adapter::{AdapterMetrics, BusAdapter, NetworkAdapter, TransportAdapter};
pub use buffer::{BufferError, BufferStats, Message, MessageBuffer, OverflowPolicy};
pub use config::{BusConfig, CourierConfig, NetworkConfig, SubscriptionConfig};
pub use error::{CourierError, CourierResult};
pub use framing::{
    DecodeError, EncodeError, Frame, FramingCodec, FramingKind, JsonFraming, JsonPayloadCodec,
    PayloadCodec, TaggedFraming, TopicFraming, WireFrame, WireRef,
};
pub use identity::{IdentityKind, IdentityRef, MessageIdentity};
pub use registry::{BufferHandle, DispatchOutcome, RegistryError, SubscriberRegistry};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, Delay, SupervisorError, SupervisorStats, ThreadDelay,
    TickOutcome,
};
pub use transport::{
    BusDriver, BusReader, BusReceiveCallback, DriverStatus, NetworkCallback, NetworkClient,
};
