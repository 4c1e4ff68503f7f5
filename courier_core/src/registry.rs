//! Subscriber registry
//!
//! An insertion-ordered table of `identity -> MessageBuffer` bindings owned by
//! one transport adapter. Bindings are added during setup only; once the
//! adapter enables receive notifications the registry is sealed and shared
//! read-only with the notification path, so `dispatch` never takes a lock on
//! the table itself.

use crate::buffer::{BufferError, MessageBuffer, OverflowPolicy};
use crate::identity::{IdentityKind, IdentityRef, MessageIdentity};
use std::sync::Arc;
use thiserror::Error;

/// Shared handle to a subscription's buffer, used by application code to drain it
pub type BufferHandle = Arc<MessageBuffer>;

/// Registration errors. All of them are setup-time failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("identity '{0}' is already registered")]
    DuplicateIdentity(MessageIdentity),

    #[error("registry accepts {expected} identities, got a {actual} one")]
    KindMismatch {
        expected: IdentityKind,
        actual: IdentityKind,
    },

    #[error("registry is full ({0} subscriptions)")]
    Full(usize),

    #[error("registry is sealed; receive notifications are already enabled")]
    Sealed,

    #[error("invalid identity: {0}")]
    InvalidIdentity(&'static str),

    #[error("invalid registry configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Result of routing one inbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Stored in the matching subscription's buffer
    Delivered,
    /// A subscription matched but its buffer refused the payload
    Rejected(BufferError),
    /// No subscription is bound to the identity
    Unrouted,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// One identity bound to one buffer
#[derive(Debug, Clone)]
pub struct Subscription {
    identity: MessageIdentity,
    buffer: BufferHandle,
}

impl Subscription {
    pub fn identity(&self) -> &MessageIdentity {
        &self.identity
    }

    pub fn buffer(&self) -> &BufferHandle {
        &self.buffer
    }
}

/// Ordered collection of subscriptions for one adapter
#[derive(Debug)]
pub struct SubscriberRegistry {
    kind: IdentityKind,
    max_subscriptions: usize,
    subscriptions: Vec<Subscription>,
    sealed: bool,
}

impl SubscriberRegistry {
    /// Create a registry accepting `kind` identities, pre-sized for
    /// `max_subscriptions` bindings.
    pub fn new(kind: IdentityKind, max_subscriptions: usize) -> Result<Self, RegistryError> {
        if max_subscriptions == 0 {
            return Err(RegistryError::InvalidConfig(
                "max_subscriptions must be non-zero",
            ));
        }
        Ok(Self {
            kind,
            max_subscriptions,
            subscriptions: Vec::with_capacity(max_subscriptions),
            sealed: false,
        })
    }

    /// Create a fresh buffer and bind it to `identity`.
    ///
    /// An identity that is already bound is refused and the existing binding
    /// is left untouched.
    pub fn register(
        &mut self,
        identity: MessageIdentity,
        capacity: usize,
        slot_size: usize,
        policy: OverflowPolicy,
    ) -> Result<BufferHandle, RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        if identity.kind() != self.kind {
            return Err(RegistryError::KindMismatch {
                expected: self.kind,
                actual: identity.kind(),
            });
        }
        identity.validate().map_err(RegistryError::InvalidIdentity)?;
        if self.position(identity.as_identity_ref()).is_some() {
            return Err(RegistryError::DuplicateIdentity(identity));
        }
        if self.subscriptions.len() == self.max_subscriptions {
            return Err(RegistryError::Full(self.max_subscriptions));
        }

        let buffer = Arc::new(
            MessageBuffer::new(capacity, slot_size, policy)?.with_identity(identity.clone()),
        );
        log::debug!(
            "Registered subscription '{}' ({} x {}B, {:?})",
            identity,
            capacity,
            slot_size,
            policy
        );
        self.subscriptions.push(Subscription {
            identity,
            buffer: buffer.clone(),
        });
        Ok(buffer)
    }

    /// Route a payload to the buffer bound to `identity`.
    ///
    /// Linear scan in registration order. Identities are unique so at most
    /// one subscription can match.
    #[inline]
    pub fn dispatch(&self, identity: IdentityRef<'_>, payload: &[u8]) -> DispatchOutcome {
        match self.position(identity) {
            Some(index) => match self.subscriptions[index].buffer.enqueue(payload) {
                Ok(()) => DispatchOutcome::Delivered,
                Err(err) => DispatchOutcome::Rejected(err),
            },
            None => DispatchOutcome::Unrouted,
        }
    }

    /// Buffer bound to `identity`, if any
    pub fn lookup<'a>(&self, identity: impl Into<IdentityRef<'a>>) -> Option<BufferHandle> {
        self.position(identity.into())
            .map(|index| self.subscriptions[index].buffer.clone())
    }

    /// Refuse further registrations
    pub fn seal(&mut self) {
        if !self.sealed {
            log::debug!(
                "Sealed registry with {} subscription(s)",
                self.subscriptions.len()
            );
        }
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn kind(&self) -> IdentityKind {
        self.kind
    }

    pub fn max_subscriptions(&self) -> usize {
        self.max_subscriptions
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Subscriptions in registration order
    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.iter()
    }

    /// Bound identities in registration order
    pub fn identities(&self) -> impl Iterator<Item = &MessageIdentity> {
        self.subscriptions.iter().map(|s| &s.identity)
    }

    #[inline]
    fn position(&self, identity: IdentityRef<'_>) -> Option<usize> {
        self.subscriptions
            .iter()
            .position(|s| s.identity.matches(identity))
    }
}
