//! Topic framing for network transports
//!
//! The identity lives in the topic: `base_topic || identity_suffix`, where the
//! suffix is the decimal id or the symbolic name. The message body is the raw
//! payload. Outbound and inbound traffic may use different base topics.

use super::{check_payload_len, DecodeError, EncodeError, Frame, FramingCodec, WireFrame, WireRef};
use crate::identity::{IdentityKind, IdentityRef, MessageIdentity};

/// Identity-in-topic framing
#[derive(Debug, Clone)]
pub struct TopicFraming {
    publish_base: String,
    subscribe_base: String,
    kind: IdentityKind,
    max_payload: usize,
}

impl TopicFraming {
    pub fn new(
        publish_base: impl Into<String>,
        subscribe_base: impl Into<String>,
        kind: IdentityKind,
        max_payload: usize,
    ) -> Self {
        Self {
            publish_base: publish_base.into(),
            subscribe_base: subscribe_base.into(),
            kind,
            max_payload,
        }
    }

    /// Topic an identity is published on
    pub fn publish_topic(&self, identity: &MessageIdentity) -> String {
        format!("{}{}", self.publish_base, identity)
    }

    /// Topic to subscribe to for an identity
    pub fn subscription_topic(&self, identity: &MessageIdentity) -> String {
        format!("{}{}", self.subscribe_base, identity)
    }

    pub fn publish_base(&self) -> &str {
        &self.publish_base
    }

    pub fn subscribe_base(&self) -> &str {
        &self.subscribe_base
    }

    fn parse_suffix<'a>(&self, suffix: &'a str) -> Result<IdentityRef<'a>, DecodeError> {
        if suffix.is_empty() {
            return Err(DecodeError::MalformedHeader("topic carries no identity"));
        }
        match self.kind {
            IdentityKind::Numeric => {
                // Only the canonical decimal form matches, "07" is not 7
                let canonical = suffix.bytes().all(|b| b.is_ascii_digit())
                    && (suffix.len() == 1 || !suffix.starts_with('0'));
                if !canonical {
                    return Err(DecodeError::MalformedHeader("non-numeric identity suffix"));
                }
                suffix
                    .parse::<u16>()
                    .map(IdentityRef::Numeric)
                    .map_err(|_| DecodeError::MalformedHeader("identity suffix out of range"))
            }
            IdentityKind::Symbolic => Ok(IdentityRef::Symbolic(suffix)),
        }
    }
}

impl FramingCodec for TopicFraming {
    fn name(&self) -> &'static str {
        "topic"
    }

    fn max_payload(&self) -> usize {
        self.max_payload
    }

    fn max_frame_len(&self) -> usize {
        self.max_payload
    }

    fn identity_kind(&self) -> IdentityKind {
        self.kind
    }

    fn encode(&self, identity: &MessageIdentity, payload: &[u8]) -> Result<WireFrame, EncodeError> {
        check_payload_len(payload.len(), self.max_payload)?;
        self.check_identity(identity)?;
        Ok(WireFrame {
            address: Some(self.publish_topic(identity)),
            body: payload.to_vec(),
        })
    }

    fn decode<'a>(&self, wire: WireRef<'a>) -> Result<Frame<'a>, DecodeError> {
        let topic = wire
            .address
            .ok_or(DecodeError::MalformedHeader("frame has no topic"))?;
        let suffix = topic
            .strip_prefix(self.subscribe_base.as_str())
            .ok_or(DecodeError::MalformedHeader("topic outside subscription base"))?;
        let identity = self.parse_suffix(suffix)?;

        if wire.body.len() > self.max_payload {
            return Err(DecodeError::PayloadTooLarge {
                len: wire.body.len(),
                max: self.max_payload,
            });
        }

        Ok(Frame {
            identity,
            payload: wire.body,
        })
    }
}
