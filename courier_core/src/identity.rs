//! Message identities
//!
//! An identity is the logical key that separates one message stream from
//! another inside a registry. Adapters pick one [`IdentityKind`] and use it for
//! every subscription they manage.
//!
//! Decoders hand out [`IdentityRef`] values that borrow from the received
//! frame, so matching an inbound message never allocates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which variant of [`MessageIdentity`] a registry accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Fixed-width numeric ids (the bus default)
    #[default]
    Numeric,
    /// Message type names
    Symbolic,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric => write!(f, "numeric"),
            Self::Symbolic => write!(f, "symbolic"),
        }
    }
}

/// Owned message identity
///
/// Deserializes from either a number (`7`) or a string (`"temperature"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageIdentity {
    Numeric(u16),
    Symbolic(String),
}

/// Borrowed message identity produced by decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityRef<'a> {
    Numeric(u16),
    Symbolic(&'a str),
}

impl MessageIdentity {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Numeric(_) => IdentityKind::Numeric,
            Self::Symbolic(_) => IdentityKind::Symbolic,
        }
    }

    /// Borrow this identity for matching against decoded frames
    pub fn as_identity_ref(&self) -> IdentityRef<'_> {
        match self {
            Self::Numeric(id) => IdentityRef::Numeric(*id),
            Self::Symbolic(name) => IdentityRef::Symbolic(name.as_str()),
        }
    }

    /// Exact match within one variant; different variants never match.
    #[inline]
    pub fn matches(&self, other: IdentityRef<'_>) -> bool {
        match (self, other) {
            (Self::Numeric(a), IdentityRef::Numeric(b)) => *a == b,
            (Self::Symbolic(a), IdentityRef::Symbolic(b)) => a.as_str() == b,
            _ => false,
        }
    }

    /// Check that a symbolic name is well formed.
    ///
    /// Codecs may impose further limits, see
    /// [`FramingCodec::check_identity`](crate::framing::FramingCodec::check_identity).
    pub fn validate(&self) -> Result<(), &'static str> {
        match self {
            Self::Numeric(_) => Ok(()),
            Self::Symbolic(name) if name.is_empty() => Err("symbolic identity must not be empty"),
            Self::Symbolic(name) if name.contains('\0') => {
                Err("symbolic identity must not contain NUL bytes")
            }
            Self::Symbolic(_) => Ok(()),
        }
    }
}

impl<'a> IdentityRef<'a> {
    pub fn kind(&self) -> IdentityKind {
        match self {
            Self::Numeric(_) => IdentityKind::Numeric,
            Self::Symbolic(_) => IdentityKind::Symbolic,
        }
    }

    pub fn to_identity(&self) -> MessageIdentity {
        match *self {
            Self::Numeric(id) => MessageIdentity::Numeric(id),
            Self::Symbolic(name) => MessageIdentity::Symbolic(name.to_string()),
        }
    }
}

impl fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_identity_ref().fmt(f)
    }
}

impl fmt::Display for IdentityRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{}", id),
            Self::Symbolic(name) => write!(f, "{}", name),
        }
    }
}

impl From<u16> for MessageIdentity {
    fn from(id: u16) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for MessageIdentity {
    fn from(name: &str) -> Self {
        Self::Symbolic(name.to_string())
    }
}

impl From<String> for MessageIdentity {
    fn from(name: String) -> Self {
        Self::Symbolic(name)
    }
}

impl<'a> From<&'a MessageIdentity> for IdentityRef<'a> {
    fn from(identity: &'a MessageIdentity) -> Self {
        identity.as_identity_ref()
    }
}
