//! Payload codecs
//!
//! Framing treats payloads as opaque bytes. A payload codec sits on top and
//! turns application values into those bytes and back.

use crate::error::{CourierError, CourierResult};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Typed value <-> payload bytes
pub trait PayloadCodec {
    fn serialize<T: Serialize>(&self, value: &T) -> CourierResult<Vec<u8>>;

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CourierResult<T>;
}

/// serde_json payload codec
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadCodec;

impl PayloadCodec for JsonPayloadCodec {
    fn serialize<T: Serialize>(&self, value: &T) -> CourierResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(CourierError::from)
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CourierResult<T> {
        serde_json::from_slice(bytes).map_err(CourierError::from)
    }
}
