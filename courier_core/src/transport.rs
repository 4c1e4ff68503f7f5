//! Transport driver interfaces
//!
//! The adapters never talk to hardware directly. A bus peripheral or a
//! network client is consumed through the narrow traits below; concrete
//! drivers (simulation, Linux i2c-dev, ...) live in `courier_library`.

use crate::error::CourierResult;

/// Driver status for lifecycle tracking
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DriverStatus {
    /// Driver has not been initialized yet
    #[default]
    Uninitialized,
    /// Driver is ready to operate
    Ready,
    /// Driver has moved traffic
    Running,
    /// Driver encountered an error
    Error(String),
    /// Driver has been shut down
    Shutdown,
}

impl DriverStatus {
    /// Ready or Running
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Ready | Self::Running)
    }
}

impl std::fmt::Display for DriverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Ready => write!(f, "Ready"),
            Self::Running => write!(f, "Running"),
            Self::Error(msg) => write!(f, "Error: {}", msg),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

// ============================================================================
// Bus
// ============================================================================

/// Read side of a bus receive notification
pub trait BusReader {
    /// Copy up to `buf.len()` pending bytes into `buf`, returning how many
    /// were copied. Returns 0 once the current frame is exhausted.
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize;
}

/// Invoked by the driver, possibly from its own thread, with a reader over
/// the received frame and the frame's byte count.
pub type BusReceiveCallback = Box<dyn FnMut(&mut dyn BusReader, usize) + Send>;

/// Addressed, frame-oriented bus peripheral (I2C-style)
pub trait BusDriver: Send {
    /// Short driver name for logs and send errors
    fn name(&self) -> &'static str;

    /// Start a frame addressed to `address`
    fn begin_transmission(&mut self, address: u8) -> CourierResult<()>;

    /// Append bytes to the current frame, returning how many were accepted
    fn write(&mut self, bytes: &[u8]) -> CourierResult<usize>;

    /// Flush the current frame onto the bus
    fn end_transmission(&mut self) -> CourierResult<()>;

    /// Install the inbound notification. Replaces any previous callback.
    fn set_receive_callback(&mut self, callback: BusReceiveCallback);

    fn status(&self) -> DriverStatus;
}

// ============================================================================
// Network
// ============================================================================

/// Invoked with `(topic, body)` for every message arriving on a subscribed topic
pub type NetworkCallback = Box<dyn FnMut(&str, &[u8]) + Send>;

/// Broker-style publish/subscribe client (MQTT-style)
///
/// Methods report success as a plain flag, the way broker client libraries
/// do; the adapter and supervisor turn those into typed errors.
pub trait NetworkClient: Send {
    /// Attempt one session establishment
    fn connect(&mut self, client_id: &str) -> bool;

    fn connected(&self) -> bool;

    fn subscribe(&mut self, topic: &str) -> bool;

    fn publish(&mut self, topic: &str, body: &[u8]) -> bool;

    /// Install the inbound notification. Replaces any previous callback.
    fn set_callback(&mut self, callback: NetworkCallback);

    /// Pump the client once; inbound callbacks fire from here
    fn poll(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_status_display() {
        assert_eq!(DriverStatus::Ready.to_string(), "Ready");
        assert_eq!(
            DriverStatus::Error("bus stuck".to_string()).to_string(),
            "Error: bus stuck"
        );
        assert_eq!(DriverStatus::default(), DriverStatus::Uninitialized);
    }

    #[test]
    fn test_driver_status_operational() {
        assert!(DriverStatus::Ready.is_operational());
        assert!(DriverStatus::Running.is_operational());
        assert!(!DriverStatus::Shutdown.is_operational());
        assert!(!DriverStatus::Error("x".into()).is_operational());
    }
}
