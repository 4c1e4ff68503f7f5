//! JSON document framing for bus transports
//!
//! Frames are `{"msgId": <u16>, "payload": "<text>"}`. Only numeric identities
//! and UTF-8 text payloads that need no JSON escaping can be carried, so the
//! decoded payload is always a slice of the received bytes. Decoding goes
//! through `serde-json-core`, which neither allocates nor boxes its errors.

use super::{check_payload_len, DecodeError, EncodeError, Frame, FramingCodec, WireFrame, WireRef};
use crate::identity::{IdentityKind, IdentityRef, MessageIdentity};
use serde::{Deserialize, Serialize};
use serde_json_core::de::Error as JsonError;

/// Room for `{"msgId":65535,"payload":""}` plus some whitespace
const ENVELOPE_OVERHEAD: usize = 32;

#[derive(Serialize)]
struct JsonFrameOut<'a> {
    #[serde(rename = "msgId")]
    msg_id: u16,
    payload: &'a str,
}

#[derive(Deserialize)]
struct JsonFrameIn<'a> {
    #[serde(rename = "msgId")]
    msg_id: u16,
    payload: &'a str,
}

/// Bytes that would be written as an escape sequence inside a JSON string
#[inline]
fn needs_escape(byte: u8) -> bool {
    byte == b'"' || byte == b'\\' || byte < 0x20
}

/// `{"msgId": .., "payload": ..}` framing
#[derive(Debug, Clone)]
pub struct JsonFraming {
    max_payload: usize,
}

impl JsonFraming {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }
}

impl FramingCodec for JsonFraming {
    fn name(&self) -> &'static str {
        "json"
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn max_frame_len(&self) -> usize {
        ENVELOPE_OVERHEAD + self.max_payload
    }

    fn identity_kind(&self) -> IdentityKind {
        IdentityKind::Numeric
    }

    fn encode(&self, identity: &MessageIdentity, payload: &[u8]) -> Result<WireFrame, EncodeError> {
        check_payload_len(payload.len(), self.max_payload)?;
        self.check_identity(identity)?;
        let msg_id = match identity {
            MessageIdentity::Numeric(id) => *id,
            MessageIdentity::Symbolic(_) => {
                return Err(EncodeError::UnsupportedIdentity {
                    identity: identity.clone(),
                    codec: self.name(),
                })
            }
        };
        let payload = std::str::from_utf8(payload).map_err(|_| {
            EncodeError::Serialization("JSON framing carries UTF-8 text payloads".to_string())
        })?;
        if payload.bytes().any(needs_escape) {
            return Err(EncodeError::Serialization(
                "JSON framing payloads must not need escaping".to_string(),
            ));
        }

        let body = serde_json::to_vec(&JsonFrameOut { msg_id, payload })
            .map_err(|e| EncodeError::Serialization(e.to_string()))?;
        Ok(WireFrame {
            address: None,
            body,
        })
    }

    fn decode<'a>(&self, wire: WireRef<'a>) -> Result<Frame<'a>, DecodeError> {
        let body = wire.body;
        if body.len() > self.max_frame_len() {
            return Err(DecodeError::PayloadTooLarge {
                len: body.len(),
                max: self.max_frame_len(),
            });
        }
        // Backslashes only occur inside strings, and only as escapes
        if body.contains(&b'\\') {
            return Err(DecodeError::MalformedHeader("escaped JSON string"));
        }

        let (frame, _) =
            serde_json_core::from_slice::<JsonFrameIn<'a>>(body).map_err(|err| match err {
                JsonError::EofWhileParsingList
                | JsonError::EofWhileParsingObject
                | JsonError::EofWhileParsingString
                | JsonError::EofWhileParsingNumber
                | JsonError::EofWhileParsingValue => DecodeError::Truncated {
                    expected: body.len() + 1,
                    actual: body.len(),
                },
                _ => DecodeError::MalformedHeader("invalid JSON frame"),
            })?;

        if frame.payload.len() > self.max_payload {
            return Err(DecodeError::PayloadTooLarge {
                len: frame.payload.len(),
                max: self.max_payload,
            });
        }

        Ok(Frame {
            identity: IdentityRef::Numeric(frame.msg_id),
            payload: frame.payload.as_bytes(),
        })
    }
}
