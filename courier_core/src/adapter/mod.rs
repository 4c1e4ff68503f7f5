//! Transport adapters
//!
//! An adapter owns one [`SubscriberRegistry`] and wires a transport driver to
//! it through a [`FramingCodec`]. Every adapter follows the same lifecycle:
//!
//! 1. `setup` validates the config and registers the subscriptions it lists
//! 2. `register_subscription` adds more bindings
//! 3. `start` seals the registry and enables receive notifications
//! 4. the main loop calls `poll` and drains the returned buffer handles
//!
//! Inbound failures (undecodable frames, unrouted identities, full buffers)
//! never reach the caller; they are counted in [`AdapterMetrics`].

mod bus;
mod network;

pub use bus::BusAdapter;
pub use network::NetworkAdapter;

use crate::buffer::{BufferError, OverflowPolicy};
use crate::config::SubscriptionConfig;
use crate::error::{CourierError, CourierResult};
use crate::framing::{DecodeError, FramingCodec, JsonPayloadCodec, PayloadCodec, WireRef};
use crate::identity::{IdentityRef, MessageIdentity};
use crate::registry::{BufferHandle, DispatchOutcome, SubscriberRegistry};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Adapter counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterMetrics {
    /// Receive notifications handled
    pub frames_received: u64,
    /// Payloads stored in a subscription buffer
    pub delivered: u64,
    /// Frames whose identity has no subscription
    pub unrouted: u64,
    /// Frames the codec could not decode
    pub decode_errors: u64,
    /// Payloads refused by a full buffer
    pub rejected_full: u64,
    /// Frames or payloads dropped for exceeding a size ceiling
    pub oversized: u64,
    pub sent: u64,
    pub send_failures: u64,
    pub reconnects: u64,
}

/// Lock-free counters shared with the receive notification
#[derive(Debug, Default)]
pub(crate) struct AtomicAdapterMetrics {
    frames_received: AtomicU64,
    delivered: AtomicU64,
    unrouted: AtomicU64,
    decode_errors: AtomicU64,
    rejected_full: AtomicU64,
    oversized: AtomicU64,
    sent: AtomicU64,
    send_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl AtomicAdapterMetrics {
    #[inline]
    pub(crate) fn frame_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn oversized(&self) {
        self.oversized.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reconnected(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    fn decode_failed(&self, err: &DecodeError) {
        match err {
            DecodeError::PayloadTooLarge { .. } => self.oversized(),
            _ => {
                self.decode_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    fn dispatched(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Delivered => &self.delivered,
            DispatchOutcome::Unrouted => &self.unrouted,
            DispatchOutcome::Rejected(BufferError::OversizedPayload { .. }) => &self.oversized,
            DispatchOutcome::Rejected(_) => &self.rejected_full,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> AdapterMetrics {
        AdapterMetrics {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unrouted: self.unrouted.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            rejected_full: self.rejected_full.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

/// Decode one inbound frame and hand it to the registry.
///
/// Runs in the receive notification: no allocation, no error escapes.
#[inline]
pub(crate) fn route_frame(
    codec: &dyn FramingCodec,
    registry: &SubscriberRegistry,
    metrics: &AtomicAdapterMetrics,
    wire: WireRef<'_>,
) {
    match codec.decode(wire) {
        Ok(frame) => {
            let outcome = registry.dispatch(frame.identity, frame.payload);
            if !outcome.is_delivered() {
                log::trace!("Frame for '{}' not delivered: {:?}", frame.identity, outcome);
            }
            metrics.dispatched(&outcome);
        }
        Err(err) => {
            log::trace!("Dropped undecodable {} frame: {}", codec.name(), err);
            metrics.decode_failed(&err);
        }
    }
}

/// Common surface of the bus and network adapters
pub trait TransportAdapter {
    /// Short transport name for logs and errors
    fn transport_name(&self) -> &'static str;

    /// Bind a new buffer to `identity`. Fails once the adapter is started.
    fn register_subscription(
        &mut self,
        identity: MessageIdentity,
        capacity: usize,
        slot_size: usize,
        policy: OverflowPolicy,
    ) -> CourierResult<BufferHandle>;

    /// Seal the registry and enable receive notifications
    fn start(&mut self) -> CourierResult<()>;

    fn is_started(&self) -> bool;

    /// Frame `payload` under `identity` and write it to the transport.
    /// Transport failures are reported as `SendFailed` and not retried.
    fn send(&mut self, identity: &MessageIdentity, payload: &[u8]) -> CourierResult<()>;

    /// Main-loop hook
    fn poll(&mut self) -> CourierResult<()>;

    /// Buffer bound to `identity`, if any
    fn lookup(&self, identity: IdentityRef<'_>) -> Option<BufferHandle>;

    fn metrics(&self) -> AdapterMetrics;

    /// Register one configured subscription
    fn register(&mut self, subscription: &SubscriptionConfig) -> CourierResult<BufferHandle> {
        self.register_subscription(
            subscription.identity.clone(),
            subscription.capacity,
            subscription.slot_size,
            subscription.policy,
        )
    }

    /// Serialize `value` as JSON and send it
    fn send_value<T: Serialize>(&mut self, identity: &MessageIdentity, value: &T) -> CourierResult<()>
    where
        Self: Sized,
    {
        let payload = JsonPayloadCodec.serialize(value)?;
        self.send(identity, &payload)
    }

    /// Take the oldest payload buffered for `identity` and deserialize it from JSON
    fn recv_value<T: DeserializeOwned>(&self, identity: &MessageIdentity) -> CourierResult<Option<T>>
    where
        Self: Sized,
    {
        let buffer = self
            .lookup(identity.as_identity_ref())
            .ok_or_else(|| CourierError::not_found(format!("subscription '{}'", identity)))?;
        match buffer.dequeue() {
            Some(message) => JsonPayloadCodec.deserialize(&message.payload).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::TaggedFraming;
    use crate::identity::IdentityKind;

    fn registry() -> (SubscriberRegistry, BufferHandle) {
        let mut registry = SubscriberRegistry::new(IdentityKind::Numeric, 4).unwrap();
        let buffer = registry
            .register(MessageIdentity::Numeric(1), 1, 4, OverflowPolicy::RejectNewest)
            .unwrap();
        registry.seal();
        (registry, buffer)
    }

    #[test]
    fn test_route_frame_counts_outcomes() {
        let (registry, buffer) = registry();
        let codec = TaggedFraming::new(IdentityKind::Numeric, 16);
        let metrics = AtomicAdapterMetrics::default();

        let route = |id: u16, payload: &[u8]| {
            let wire = codec.encode(&MessageIdentity::Numeric(id), payload).unwrap();
            route_frame(&codec, &registry, &metrics, WireRef::body(&wire.body));
        };
        route(1, b"ok");
        route(1, b"full");
        route(2, b"none");
        route(1, b"toolong");
        route_frame(&codec, &registry, &metrics, WireRef::body(&[0x7F]));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.rejected_full, 1);
        assert_eq!(snapshot.unrouted, 1);
        assert_eq!(snapshot.oversized, 1);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(buffer.dequeue().unwrap().payload, b"ok");
    }

    #[test]
    fn test_decode_ceiling_counts_as_oversized() {
        let (registry, _buffer) = registry();
        let codec = TaggedFraming::new(IdentityKind::Numeric, 2);
        let metrics = AtomicAdapterMetrics::default();

        // Header announces 0x0100 bytes, above the 2 byte ceiling
        route_frame(&codec, &registry, &metrics, WireRef::body(&[0x01, 0, 1, 1, 0]));
        assert_eq!(metrics.snapshot().oversized, 1);
        assert_eq!(metrics.snapshot().decode_errors, 0);
    }
}
