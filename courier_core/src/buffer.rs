//! Bounded message buffer
//!
//! A `MessageBuffer` is a fixed-capacity ring of equally sized payload slots.
//! Storage is allocated once when the buffer is created; `enqueue` only copies
//! into an existing slot, so it is safe to call from a receive notification.
//!
//! One writer (the receive notification) and one reader (main-loop code) may
//! use a buffer concurrently. Cursor and slot updates happen inside a short
//! critical section that never spans a blocking call.

use crate::identity::MessageIdentity;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Behaviour when a payload arrives at a full buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming payload and report `Full`
    #[default]
    RejectNewest,
    /// Drop the oldest unread payload and store the incoming one
    EvictOldest,
}

impl From<bool> for OverflowPolicy {
    /// Legacy `buffer_mode` flag: `false` discards new messages, `true` replaces the oldest.
    fn from(replace_oldest: bool) -> Self {
        if replace_oldest {
            Self::EvictOldest
        } else {
            Self::RejectNewest
        }
    }
}

/// Errors reported by [`MessageBuffer`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("invalid buffer configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("buffer full")]
    Full,

    #[error("payload of {len} bytes exceeds slot size {slot_size}")]
    OversizedPayload { len: usize, slot_size: usize },

    #[error("output buffer holds {available} bytes, message needs {needed}")]
    OutputTooSmall { needed: usize, available: usize },
}

/// A payload taken out of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Identity of the subscription the payload was delivered to (if any)
    pub identity: Option<MessageIdentity>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Counter snapshot for one buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub enqueued: u64,
    pub dequeued: u64,
    pub rejected_full: u64,
    pub evicted: u64,
    pub oversized: u64,
}

#[derive(Debug, Default)]
struct AtomicBufferStats {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    rejected_full: AtomicU64,
    evicted: AtomicU64,
    oversized: AtomicU64,
}

impl AtomicBufferStats {
    fn snapshot(&self) -> BufferStats {
        BufferStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
        }
    }
}

/// Ring state guarded by the buffer's critical section
struct Ring {
    storage: Box<[u8]>,
    lengths: Box<[usize]>,
    read: usize,
    write: usize,
    count: usize,
}

impl Ring {
    #[inline]
    fn advance(&self, cursor: usize) -> usize {
        let next = cursor + 1;
        if next == self.lengths.len() {
            0
        } else {
            next
        }
    }
}

/// Bounded FIFO of fixed-size payload slots
pub struct MessageBuffer {
    capacity: usize,
    slot_size: usize,
    policy: OverflowPolicy,
    identity: Option<MessageIdentity>,
    ring: Mutex<Ring>,
    stats: AtomicBufferStats,
}

impl MessageBuffer {
    /// Create a buffer with `capacity` slots of `slot_size` bytes each
    pub fn new(
        capacity: usize,
        slot_size: usize,
        policy: OverflowPolicy,
    ) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidConfig("capacity must be non-zero"));
        }
        if slot_size == 0 {
            return Err(BufferError::InvalidConfig("slot size must be non-zero"));
        }
        let total = capacity
            .checked_mul(slot_size)
            .ok_or(BufferError::InvalidConfig("capacity * slot size overflows"))?;

        Ok(Self {
            capacity,
            slot_size,
            policy,
            identity: None,
            ring: Mutex::new(Ring {
                storage: vec![0u8; total].into_boxed_slice(),
                lengths: vec![0usize; capacity].into_boxed_slice(),
                read: 0,
                write: 0,
                count: 0,
            }),
            stats: AtomicBufferStats::default(),
        })
    }

    /// Tag dequeued messages with the identity this buffer is bound to
    pub(crate) fn with_identity(mut self, identity: MessageIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Store a payload, applying the overflow policy when full.
    ///
    /// Never allocates.
    pub fn enqueue(&self, payload: &[u8]) -> Result<(), BufferError> {
        if payload.len() > self.slot_size {
            self.stats.oversized.fetch_add(1, Ordering::Relaxed);
            return Err(BufferError::OversizedPayload {
                len: payload.len(),
                slot_size: self.slot_size,
            });
        }

        let mut ring = self.ring.lock();
        if ring.count == self.capacity {
            match self.policy {
                OverflowPolicy::RejectNewest => {
                    drop(ring);
                    self.stats.rejected_full.fetch_add(1, Ordering::Relaxed);
                    return Err(BufferError::Full);
                }
                OverflowPolicy::EvictOldest => {
                    // Drop from the head of the unread window
                    ring.read = ring.advance(ring.read);
                    ring.count -= 1;
                    self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                }
            }
        }

        let slot = ring.write;
        let start = slot * self.slot_size;
        ring.storage[start..start + payload.len()].copy_from_slice(payload);
        ring.lengths[slot] = payload.len();
        ring.write = ring.advance(slot);
        ring.count += 1;
        drop(ring);

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove and return the oldest unread payload.
    ///
    /// Allocates only when a payload is returned.
    pub fn dequeue(&self) -> Option<Message> {
        let payload = {
            let mut ring = self.ring.lock();
            if ring.count == 0 {
                return None;
            }
            let slot = ring.read;
            let start = slot * self.slot_size;
            let len = ring.lengths[slot];
            let payload = ring.storage[start..start + len].to_vec();
            ring.read = ring.advance(slot);
            ring.count -= 1;
            payload
        };

        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(Message {
            identity: self.identity.clone(),
            payload,
        })
    }

    /// Copy the oldest unread payload into `out` without allocating.
    ///
    /// Returns the payload length. If `out` is too small the payload stays
    /// in the buffer.
    pub fn dequeue_into(&self, out: &mut [u8]) -> Result<Option<usize>, BufferError> {
        let len = {
            let mut ring = self.ring.lock();
            if ring.count == 0 {
                return Ok(None);
            }
            let slot = ring.read;
            let len = ring.lengths[slot];
            if len > out.len() {
                return Err(BufferError::OutputTooSmall {
                    needed: len,
                    available: out.len(),
                });
            }
            let start = slot * self.slot_size;
            out[..len].copy_from_slice(&ring.storage[start..start + len]);
            ring.read = ring.advance(slot);
            ring.count -= 1;
            len
        };

        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Ok(Some(len))
    }

    /// Discard every unread payload
    pub fn clear(&self) {
        let mut ring = self.ring.lock();
        ring.read = 0;
        ring.write = 0;
        ring.count = 0;
    }

    pub fn len(&self) -> usize {
        self.ring.lock().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn identity(&self) -> Option<&MessageIdentity> {
        self.identity.as_ref()
    }

    pub fn stats(&self) -> BufferStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("identity", &self.identity)
            .field("capacity", &self.capacity)
            .field("slot_size", &self.slot_size)
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
