//! Tagged framing for bus transports
//!
//! ```text
//! numeric:  | 0x01 | id: u16 BE      | len: u16 BE | payload[len] |
//! symbolic: | 0x02 | name: [u8; 16]  | len: u16 BE | payload[len] |
//! ```
//!
//! Symbolic names are NUL-padded to the fixed field width.

use super::{check_payload_len, DecodeError, EncodeError, Frame, FramingCodec, WireFrame, WireRef};
use crate::identity::{IdentityKind, IdentityRef, MessageIdentity};

const TAG_NUMERIC: u8 = 0x01;
const TAG_SYMBOLIC: u8 = 0x02;
const LEN_FIELD_WIDTH: usize = 2;

/// Width of the NUL-padded name field for symbolic identities
pub const SYMBOLIC_FIELD_WIDTH: usize = 16;

const NUMERIC_HEADER_LEN: usize = 1 + 2 + LEN_FIELD_WIDTH;
const SYMBOLIC_HEADER_LEN: usize = 1 + SYMBOLIC_FIELD_WIDTH + LEN_FIELD_WIDTH;

/// Fixed-header framing: identity field, length, payload
#[derive(Debug, Clone)]
pub struct TaggedFraming {
    kind: IdentityKind,
    max_payload: usize,
}

impl TaggedFraming {
    /// `max_payload` is clamped to what the 16-bit length field can express.
    pub fn new(kind: IdentityKind, max_payload: usize) -> Self {
        Self {
            kind,
            max_payload: max_payload.min(u16::MAX as usize),
        }
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    fn header_len(&self) -> usize {
        match self.kind {
            IdentityKind::Numeric => NUMERIC_HEADER_LEN,
            IdentityKind::Symbolic => SYMBOLIC_HEADER_LEN,
        }
    }
}

impl FramingCodec for TaggedFraming {
    fn name(&self) -> &'static str {
        "tagged"
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn max_frame_len(&self) -> usize {
        self.header_len() + self.max_payload
    }

    fn identity_kind(&self) -> IdentityKind {
        self.kind
    }

    /// Symbolic names must also fit the fixed name field.
    fn check_identity(&self, identity: &MessageIdentity) -> Result<(), EncodeError> {
        let fits = match identity {
            MessageIdentity::Numeric(_) => true,
            MessageIdentity::Symbolic(name) => name.len() <= SYMBOLIC_FIELD_WIDTH,
        };
        if !fits || identity.kind() != self.kind || identity.validate().is_err() {
            return Err(EncodeError::UnsupportedIdentity {
                identity: identity.clone(),
                codec: self.name(),
            });
        }
        Ok(())
    }

    fn encode(&self, identity: &MessageIdentity, payload: &[u8]) -> Result<WireFrame, EncodeError> {
        check_payload_len(payload.len(), self.max_payload)?;
        self.check_identity(identity)?;

        let mut body = Vec::with_capacity(self.header_len() + payload.len());
        match identity {
            MessageIdentity::Numeric(id) => {
                body.push(TAG_NUMERIC);
                body.extend_from_slice(&id.to_be_bytes());
            }
            MessageIdentity::Symbolic(name) => {
                body.push(TAG_SYMBOLIC);
                let mut field = [0u8; SYMBOLIC_FIELD_WIDTH];
                field[..name.len()].copy_from_slice(name.as_bytes());
                body.extend_from_slice(&field);
            }
        }
        body.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        body.extend_from_slice(payload);

        Ok(WireFrame {
            address: None,
            body,
        })
    }

    fn decode<'a>(&self, wire: WireRef<'a>) -> Result<Frame<'a>, DecodeError> {
        let bytes = wire.body;
        let (&tag, rest) = bytes
            .split_first()
            .ok_or(DecodeError::MalformedHeader("empty frame"))?;

        let (identity, rest) = match (tag, self.kind) {
            (TAG_NUMERIC, IdentityKind::Numeric) => {
                if rest.len() < 2 {
                    return Err(DecodeError::MalformedHeader("incomplete identity field"));
                }
                let id = u16::from_be_bytes([rest[0], rest[1]]);
                (IdentityRef::Numeric(id), &rest[2..])
            }
            (TAG_SYMBOLIC, IdentityKind::Symbolic) => {
                if rest.len() < SYMBOLIC_FIELD_WIDTH {
                    return Err(DecodeError::MalformedHeader("incomplete identity field"));
                }
                let name = parse_name(&rest[..SYMBOLIC_FIELD_WIDTH])?;
                (IdentityRef::Symbolic(name), &rest[SYMBOLIC_FIELD_WIDTH..])
            }
            (TAG_NUMERIC | TAG_SYMBOLIC, _) => {
                return Err(DecodeError::MalformedHeader("identity kind not accepted"))
            }
            _ => return Err(DecodeError::MalformedHeader("unknown identity tag")),
        };

        if rest.len() < LEN_FIELD_WIDTH {
            return Err(DecodeError::MalformedHeader("incomplete length field"));
        }
        let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let payload = &rest[LEN_FIELD_WIDTH..];

        if len > self.max_payload {
            return Err(DecodeError::PayloadTooLarge {
                len,
                max: self.max_payload,
            });
        }
        if payload.len() < len {
            return Err(DecodeError::Truncated {
                expected: len,
                actual: payload.len(),
            });
        }
        if payload.len() > len {
            return Err(DecodeError::MalformedHeader("trailing bytes after payload"));
        }

        Ok(Frame {
            identity,
            payload,
        })
    }
}

/// Name bytes followed only by NUL padding
fn parse_name(field: &[u8]) -> Result<&str, DecodeError> {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    if end == 0 {
        return Err(DecodeError::MalformedHeader("empty identity name"));
    }
    if field[end..].iter().any(|&b| b != 0) {
        return Err(DecodeError::MalformedHeader("identity name padding"));
    }
    std::str::from_utf8(&field[..end])
        .map_err(|_| DecodeError::MalformedHeader("identity name is not UTF-8"))
}
