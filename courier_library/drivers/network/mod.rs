//! Network client drivers
//!
//! # Available Drivers
//!
//! - `SimulationNetworkClient` - Always available, talks to an in-memory `SimulationBroker`

mod simulation;

pub use simulation::{
    PublishedMessage, SimulationBroker, SimulationClientHandle, SimulationNetworkClient,
};
