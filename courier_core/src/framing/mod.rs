//! # Message framing
//!
//! A framing codec turns an `(identity, payload)` pair into what a transport
//! actually carries, and back. The two transports address messages
//! differently, so the codec is a pluggable strategy:
//!
//! - [`TaggedFraming`]: fixed header carrying the identity, then the payload (bus)
//! - [`JsonFraming`]: `{"msgId": .., "payload": ..}` document (bus, text payloads)
//! - [`TopicFraming`]: identity folded into the topic string, body is the raw payload (network)
//!
//! Every codec enforces a hard `max_payload` ceiling so a length read off the
//! wire can never make the receive path copy more than the adapter sized its
//! staging buffer for.

mod json;
mod payload;
mod tagged;
mod topic;

pub use json::JsonFraming;
pub use payload::{JsonPayloadCodec, PayloadCodec};
pub use tagged::{TaggedFraming, SYMBOLIC_FIELD_WIDTH};
pub use topic::TopicFraming;

use crate::identity::{IdentityKind, IdentityRef, MessageIdentity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Inbound framing failures. Always dropped at the notification boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed frame header: {0}")]
    MalformedHeader(&'static str),

    #[error("truncated payload: header announces {expected} bytes, frame carries {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },
}

/// Outbound framing failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("payload of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("identity '{identity}' cannot be carried by {codec} framing")]
    UnsupportedIdentity {
        identity: MessageIdentity,
        codec: &'static str,
    },

    #[error("payload serialization failed: {0}")]
    Serialization(String),
}

/// Encoded frame, ready for a transport write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    /// Transport-level address (the topic for network transports)
    pub address: Option<String>,
    pub body: Vec<u8>,
}

/// Borrowed view of an inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireRef<'a> {
    pub address: Option<&'a str>,
    pub body: &'a [u8],
}

impl<'a> WireRef<'a> {
    /// Frame with no transport address (bus transports)
    pub fn body(body: &'a [u8]) -> Self {
        Self {
            address: None,
            body,
        }
    }

    /// Frame received on a transport-level address (network transports)
    pub fn addressed(address: &'a str, body: &'a [u8]) -> Self {
        Self {
            address: Some(address),
            body,
        }
    }
}

/// Decoded frame borrowing from the wire bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub identity: IdentityRef<'a>,
    pub payload: &'a [u8],
}

/// Converts `(identity, payload)` pairs to wire frames and back
pub trait FramingCodec: Send + Sync {
    /// Short codec name for logs and errors
    fn name(&self) -> &'static str;

    /// Largest payload this codec encodes or accepts
    fn max_payload(&self) -> usize;

    /// Largest wire body this codec can produce for `max_payload`
    fn max_frame_len(&self) -> usize;

    /// Identity variant this codec carries
    fn identity_kind(&self) -> IdentityKind;

    /// Fail unless `identity` can be encoded and decoded by this codec.
    ///
    /// Adapters call this at registration so a binding that could never
    /// be reached on the wire is refused at setup.
    fn check_identity(&self, identity: &MessageIdentity) -> Result<(), EncodeError> {
        if identity.kind() != self.identity_kind() || identity.validate().is_err() {
            return Err(EncodeError::UnsupportedIdentity {
                identity: identity.clone(),
                codec: self.name(),
            });
        }
        Ok(())
    }

    fn encode(&self, identity: &MessageIdentity, payload: &[u8]) -> Result<WireFrame, EncodeError>;

    /// Decode without allocating; the frame borrows from `wire`.
    fn decode<'a>(&self, wire: WireRef<'a>) -> Result<Frame<'a>, DecodeError>;
}

/// Bus framing selection for configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingKind {
    #[default]
    Tagged,
    Json,
}

impl FramingKind {
    /// Build the selected bus codec
    pub fn build(self, kind: IdentityKind, max_payload: usize) -> Box<dyn FramingCodec> {
        match self {
            Self::Tagged => Box::new(TaggedFraming::new(kind, max_payload)),
            Self::Json => Box::new(JsonFraming::new(max_payload)),
        }
    }
}

#[inline]
pub(crate) fn check_payload_len(len: usize, max: usize) -> Result<(), EncodeError> {
    if len > max {
        return Err(EncodeError::PayloadTooLarge { len, max });
    }
    Ok(())
}
