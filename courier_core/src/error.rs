//! Unified error handling for COURIER
//!
//! Each component reports its own focused error enum (`BufferError`,
//! `RegistryError`, `DecodeError`, ...). All of them convert into
//! [`CourierError`] so setup code can use a single `?`-friendly result type.

use thiserror::Error;

use crate::buffer::BufferError;
use crate::framing::{DecodeError, EncodeError};
use crate::registry::RegistryError;
use crate::supervisor::SupervisorError;

/// Main error type for COURIER operations
#[derive(Debug, Error)]
pub enum CourierError {
    /// I/O related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration parsing or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Message buffer errors
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Subscription registration errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Outbound framing errors
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Inbound framing errors
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Connection supervision errors
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    /// The transport refused or failed an outbound write
    #[error("Send failed on {transport}: {message}")]
    SendFailed { transport: String, message: String },

    /// Driver-related errors
    #[error("Driver error: {0}")]
    Driver(String),

    /// Adapter lifecycle errors (e.g. sending before start)
    #[error("Adapter error: {0}")]
    Adapter(String),

    /// Serialization/Deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Resource not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Catch-all for other error types
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using CourierError
pub type CourierResult<T> = Result<T, CourierError>;

impl From<serde_json::Error> for CourierError {
    fn from(err: serde_json::Error) -> Self {
        CourierError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for CourierError {
    fn from(err: toml::de::Error) -> Self {
        CourierError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<toml::ser::Error> for CourierError {
    fn from(err: toml::ser::Error) -> Self {
        CourierError::Serialization(format!("TOML serialization error: {}", err))
    }
}

impl From<serde_yaml::Error> for CourierError {
    fn from(err: serde_yaml::Error) -> Self {
        CourierError::Serialization(format!("YAML error: {}", err))
    }
}

impl From<anyhow::Error> for CourierError {
    fn from(err: anyhow::Error) -> Self {
        CourierError::Other(err.to_string())
    }
}

impl From<&str> for CourierError {
    fn from(msg: &str) -> Self {
        CourierError::Other(msg.to_string())
    }
}

impl From<String> for CourierError {
    fn from(msg: String) -> Self {
        CourierError::Other(msg)
    }
}

// Helper methods
impl CourierError {
    /// Create a configuration error with a custom message
    pub fn config<S: Into<String>>(msg: S) -> Self {
        CourierError::Config(msg.into())
    }

    /// Create a driver error
    pub fn driver<S: Into<String>>(msg: S) -> Self {
        CourierError::Driver(msg.into())
    }

    /// Create an adapter lifecycle error
    pub fn adapter<S: Into<String>>(msg: S) -> Self {
        CourierError::Adapter(msg.into())
    }

    /// Create a send failure for the named transport
    pub fn send_failed<S: Into<String>, T: Into<String>>(transport: S, message: T) -> Self {
        CourierError::SendFailed {
            transport: transport.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        CourierError::NotFound(resource.into())
    }

    /// True for errors that can only happen while wiring an adapter up.
    ///
    /// Steady-state errors (full buffers, send failures, decode errors) are
    /// never fatal to the main loop.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            CourierError::Config(_)
                | CourierError::Registry(_)
                | CourierError::Buffer(BufferError::InvalidConfig(_))
        )
    }

    /// Check if this is a send failure
    pub fn is_send_failed(&self) -> bool {
        matches!(self, CourierError::SendFailed { .. })
    }
}
