//! Bus adapter
//!
//! Inbound frames arrive through the driver's receive notification with a
//! byte count. The frame is read into a staging buffer sized once at setup
//! for the codec's largest frame; anything longer is drained from the driver
//! and counted, never copied.

use super::{route_frame, AdapterMetrics, AtomicAdapterMetrics, TransportAdapter};
use crate::buffer::OverflowPolicy;
use crate::config::BusConfig;
use crate::error::{CourierError, CourierResult};
use crate::framing::{FramingCodec, WireRef};
use crate::identity::{IdentityRef, MessageIdentity};
use crate::registry::{BufferHandle, RegistryError, SubscriberRegistry};
use crate::transport::{BusDriver, BusReader, DriverStatus};
use std::sync::Arc;

/// Adapter between a [`BusDriver`] and a subscriber registry
pub struct BusAdapter<D: BusDriver> {
    config: BusConfig,
    driver: D,
    codec: Arc<dyn FramingCodec>,
    registry: Arc<SubscriberRegistry>,
    metrics: Arc<AtomicAdapterMetrics>,
    staging: Option<Vec<u8>>,
    started: bool,
}

impl<D: BusDriver> BusAdapter<D> {
    /// Create an adapter using the framing selected in `config`
    pub fn from_config(config: BusConfig, driver: D) -> CourierResult<Self> {
        let codec = config.framing.build(config.identity_kind, config.max_payload);
        Self::setup(config, driver, codec)
    }

    /// Create an adapter with an explicit codec and register the
    /// subscriptions listed in `config`.
    pub fn setup(config: BusConfig, driver: D, codec: Box<dyn FramingCodec>) -> CourierResult<Self> {
        config.validate()?;
        let registry = SubscriberRegistry::new(config.identity_kind, config.max_subscriptions)?;
        let codec: Arc<dyn FramingCodec> = Arc::from(codec);
        if codec.identity_kind() != config.identity_kind {
            return Err(CourierError::config(format!(
                "{} codec carries {} identities, bus is configured for {}",
                codec.name(),
                codec.identity_kind(),
                config.identity_kind
            )));
        }
        let staging = vec![0u8; codec.max_frame_len()];

        log::info!(
            "Bus adapter on '{}' at 0x{:02x} ({} framing, max payload {}B)",
            driver.name(),
            config.own_address,
            codec.name(),
            codec.max_payload()
        );

        let subscriptions = config.subscriptions.clone();
        let mut adapter = Self {
            config,
            driver,
            codec,
            registry: Arc::new(registry),
            metrics: Arc::new(AtomicAdapterMetrics::default()),
            staging: Some(staging),
            started: false,
        };
        for subscription in &subscriptions {
            adapter.register(subscription)?;
        }
        Ok(adapter)
    }

    /// Send to an explicit bus address instead of the configured peer
    pub fn send_to(
        &mut self,
        address: u8,
        identity: &MessageIdentity,
        payload: &[u8],
    ) -> CourierResult<()> {
        let wire = match self.codec.encode(identity, payload) {
            Ok(wire) => wire,
            Err(err) => {
                self.metrics.send_failure();
                return Err(err.into());
            }
        };

        match self.transmit(address, &wire.body) {
            Ok(()) => {
                self.metrics.sent();
                Ok(())
            }
            Err(err) => {
                self.metrics.send_failure();
                log::warn!("Bus send of '{}' to 0x{:02x} failed: {}", identity, address, err);
                Err(CourierError::send_failed(self.driver.name(), err.to_string()))
            }
        }
    }

    fn transmit(&mut self, address: u8, body: &[u8]) -> CourierResult<()> {
        self.driver.begin_transmission(address)?;
        let written = self.driver.write(body)?;
        if written < body.len() {
            return Err(CourierError::driver(format!(
                "short write: {} of {} bytes accepted",
                written,
                body.len()
            )));
        }
        self.driver.end_transmission()
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &dyn FramingCodec {
        &*self.codec
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

/// Read a whole notification into `staging`, or drain it if it cannot fit.
///
/// Returns the filled prefix length, or `None` for a drained frame.
fn read_frame(reader: &mut dyn BusReader, count: usize, staging: &mut [u8]) -> Option<usize> {
    if count > staging.len() {
        let mut drained = 0;
        while drained < count {
            let n = reader.read_bytes(staging);
            if n == 0 {
                break;
            }
            drained += n;
        }
        return None;
    }

    let mut filled = 0;
    while filled < count {
        let n = reader.read_bytes(&mut staging[filled..count]);
        if n == 0 {
            break;
        }
        filled += n;
    }
    Some(filled)
}

impl<D: BusDriver> TransportAdapter for BusAdapter<D> {
    fn transport_name(&self) -> &'static str {
        "bus"
    }

    fn register_subscription(
        &mut self,
        identity: MessageIdentity,
        capacity: usize,
        slot_size: usize,
        policy: OverflowPolicy,
    ) -> CourierResult<BufferHandle> {
        let registry = Arc::get_mut(&mut self.registry).ok_or(RegistryError::Sealed)?;
        // Kind mismatches are reported by the registry itself
        if identity.kind() == registry.kind() {
            if let Err(err) = self.codec.check_identity(&identity) {
                log::warn!("Refusing bus subscription: {}", err);
                return Err(
                    RegistryError::InvalidIdentity("identity does not fit the bus framing").into(),
                );
            }
        }
        Ok(registry.register(identity, capacity, slot_size, policy)?)
    }

    fn start(&mut self) -> CourierResult<()> {
        if self.started {
            return Ok(());
        }
        let mut staging = self
            .staging
            .take()
            .ok_or_else(|| CourierError::adapter("bus adapter staging buffer already in use"))?;
        if let Some(registry) = Arc::get_mut(&mut self.registry) {
            registry.seal();
        }

        let registry = Arc::clone(&self.registry);
        let codec = Arc::clone(&self.codec);
        let metrics = Arc::clone(&self.metrics);
        self.driver
            .set_receive_callback(Box::new(move |reader: &mut dyn BusReader, count: usize| {
                metrics.frame_received();
                match read_frame(reader, count, &mut staging) {
                    Some(len) => {
                        route_frame(&*codec, &registry, &metrics, WireRef::body(&staging[..len]))
                    }
                    None => {
                        log::trace!("Drained oversized bus frame of {} bytes", count);
                        metrics.oversized();
                    }
                }
            }));

        self.started = true;
        log::info!(
            "Bus adapter started with {} subscription(s)",
            self.registry.len()
        );
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn send(&mut self, identity: &MessageIdentity, payload: &[u8]) -> CourierResult<()> {
        let address = self.config.peer_address;
        self.send_to(address, identity, payload)
    }

    /// The bus has no link to maintain; this only surfaces driver faults.
    fn poll(&mut self) -> CourierResult<()> {
        match self.driver.status() {
            DriverStatus::Error(msg) => Err(CourierError::driver(msg)),
            _ => Ok(()),
        }
    }

    fn lookup(&self, identity: IdentityRef<'_>) -> Option<BufferHandle> {
        self.registry.lookup(identity)
    }

    fn metrics(&self) -> AdapterMetrics {
        self.metrics.snapshot()
    }
}

impl<D: BusDriver> std::fmt::Debug for BusAdapter<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusAdapter")
            .field("driver", &self.driver.name())
            .field("codec", &self.codec.name())
            .field("own_address", &self.config.own_address)
            .field("subscriptions", &self.registry.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SubscriptionConfig;
    use crate::framing::{FramingKind, TaggedFraming};
    use crate::identity::IdentityKind;
    use crate::transport::BusReceiveCallback;

    /// Reader over a byte slice handing out at most `chunk` bytes per call
    struct SliceReader<'a> {
        bytes: &'a [u8],
        chunk: usize,
    }

    impl BusReader for SliceReader<'_> {
        fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
            let n = buf.len().min(self.bytes.len()).min(self.chunk);
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes = &self.bytes[n..];
            n
        }
    }

    #[derive(Default)]
    struct LoopbackDriver {
        callback: Option<BusReceiveCallback>,
        current: Vec<u8>,
        sent: Vec<(u8, Vec<u8>)>,
        address: u8,
        refuse_end: bool,
    }

    impl LoopbackDriver {
        fn deliver(&mut self, frame: &[u8]) {
            let callback = self.callback.as_mut().expect("callback installed");
            let mut reader = SliceReader {
                bytes: frame,
                chunk: 3,
            };
            callback(&mut reader, frame.len());
        }
    }

    impl BusDriver for LoopbackDriver {
        fn name(&self) -> &'static str {
            "loopback"
        }

        fn begin_transmission(&mut self, address: u8) -> CourierResult<()> {
            self.address = address;
            self.current.clear();
            Ok(())
        }

        fn write(&mut self, bytes: &[u8]) -> CourierResult<usize> {
            self.current.extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn end_transmission(&mut self) -> CourierResult<()> {
            if self.refuse_end {
                return Err(CourierError::driver("nack"));
            }
            self.sent.push((self.address, std::mem::take(&mut self.current)));
            Ok(())
        }

        fn set_receive_callback(&mut self, callback: BusReceiveCallback) {
            self.callback = Some(callback);
        }

        fn status(&self) -> DriverStatus {
            DriverStatus::Ready
        }
    }

    fn adapter(max_payload: usize) -> BusAdapter<LoopbackDriver> {
        let mut config = BusConfig::new(0x10, 0x20);
        config.max_payload = max_payload;
        BusAdapter::from_config(config, LoopbackDriver::default()).unwrap()
    }

    fn tagged(id: u16, payload: &[u8]) -> Vec<u8> {
        TaggedFraming::new(IdentityKind::Numeric, 64)
            .encode(&MessageIdentity::Numeric(id), payload)
            .unwrap()
            .body
    }

    #[test]
    fn test_dispatch_fills_only_matching_buffer() {
        let mut bus = adapter(32);
        let x = bus
            .register_subscription(1u16.into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap();
        let y = bus
            .register_subscription(2u16.into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap();
        bus.start().unwrap();

        bus.driver_mut().deliver(&tagged(2, b"hello"));

        assert!(x.is_empty());
        assert_eq!(y.dequeue().unwrap().payload, b"hello");
        assert_eq!(bus.metrics().delivered, 1);
        assert_eq!(bus.metrics().frames_received, 1);
    }

    #[test]
    fn test_registration_after_start_is_refused() {
        let mut bus = adapter(32);
        bus.start().unwrap();
        let err = bus
            .register_subscription(1u16.into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap_err();
        assert!(matches!(err, CourierError::Registry(RegistryError::Sealed)));
    }

    #[test]
    fn test_oversized_frame_is_drained() {
        let mut bus = adapter(4);
        let buffer = bus
            .register_subscription(1u16.into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap();
        bus.start().unwrap();

        bus.driver_mut().deliver(&tagged(1, &[0xAB; 40]));
        bus.driver_mut().deliver(&tagged(1, b"ok"));

        let metrics = bus.metrics();
        assert_eq!(metrics.oversized, 1);
        assert_eq!(metrics.delivered, 1);
        assert_eq!(buffer.dequeue().unwrap().payload, b"ok");
    }

    #[test]
    fn test_garbage_and_unrouted_frames_are_counted() {
        let mut bus = adapter(32);
        bus.register_subscription(1u16.into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap();
        bus.start().unwrap();

        bus.driver_mut().deliver(&[0xFF, 0x00]);
        bus.driver_mut().deliver(&tagged(9, b"x"));

        let metrics = bus.metrics();
        assert_eq!(metrics.decode_errors, 1);
        assert_eq!(metrics.unrouted, 1);
        assert_eq!(metrics.delivered, 0);
    }

    #[test]
    fn test_send_frames_to_peer() {
        let mut bus = adapter(32);
        bus.send(&MessageIdentity::Numeric(7), &[1, 2]).unwrap();
        bus.send_to(0x30, &MessageIdentity::Numeric(8), &[]).unwrap();

        let sent = &bus.driver().sent;
        assert_eq!(sent[0], (0x20, vec![0x01, 0x00, 0x07, 0x00, 0x02, 0x01, 0x02]));
        assert_eq!(sent[1].0, 0x30);
        assert_eq!(bus.metrics().sent, 2);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let mut bus = adapter(32);
        bus.driver_mut().refuse_end = true;

        let err = bus.send(&MessageIdentity::Numeric(7), b"x").unwrap_err();
        assert!(err.is_send_failed());
        assert_eq!(bus.metrics().send_failures, 1);

        let err = bus.send(&MessageIdentity::Numeric(7), &[0; 33]).unwrap_err();
        assert!(matches!(err, CourierError::Encode(_)));
        assert_eq!(bus.metrics().send_failures, 2);
    }

    #[test]
    fn test_setup_registers_configured_subscriptions() {
        let mut config = BusConfig::new(0x10, 0x20);
        config.framing = FramingKind::Json;
        config.subscriptions = vec![
            SubscriptionConfig::new(3u16, 2, 16),
            SubscriptionConfig::new(4u16, 2, 16),
        ];
        let mut bus = BusAdapter::from_config(config, LoopbackDriver::default()).unwrap();
        assert_eq!(bus.registry().len(), 2);
        bus.start().unwrap();

        bus.driver_mut().deliver(br#"{"msgId":4,"payload":"21.5"}"#);
        let buffer = bus.lookup(IdentityRef::Numeric(4)).unwrap();
        assert_eq!(buffer.dequeue().unwrap().payload, b"21.5");
    }

    #[test]
    fn test_setup_rejects_duplicate_configured_identity() {
        let mut config = BusConfig::new(0x10, 0x20);
        config.subscriptions = vec![
            SubscriptionConfig::new(3u16, 2, 16),
            SubscriptionConfig::new(3u16, 2, 16),
        ];
        let err = BusAdapter::from_config(config, LoopbackDriver::default()).unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_symbolic_name_wider_than_tagged_field_is_refused() {
        let mut config = BusConfig::new(0x10, 0x20);
        config.identity_kind = IdentityKind::Symbolic;
        let mut bus = BusAdapter::from_config(config, LoopbackDriver::default()).unwrap();

        let err = bus
            .register_subscription(
                "front_left_wheel_speed".into(),
                4,
                8,
                OverflowPolicy::RejectNewest,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CourierError::Registry(RegistryError::InvalidIdentity(_))
        ));
        assert!(err.is_setup_error());
        assert!(bus.registry().is_empty());

        let wheel = bus
            .register_subscription("wheel_speed".into(), 4, 8, OverflowPolicy::RejectNewest)
            .unwrap();
        bus.start().unwrap();
        bus.send(&"wheel_speed".into(), b"12").unwrap();
        let (_, frame) = bus.driver_mut().sent.pop().unwrap();
        bus.driver_mut().deliver(&frame);
        assert_eq!(wheel.dequeue().unwrap().payload, b"12");
    }

    #[test]
    fn test_configured_subscription_that_cannot_be_framed_fails_setup() {
        let mut config = BusConfig::new(0x10, 0x20);
        config.identity_kind = IdentityKind::Symbolic;
        config.subscriptions = vec![SubscriptionConfig::new("front_left_wheel_speed", 2, 8)];
        let err = BusAdapter::from_config(config, LoopbackDriver::default()).unwrap_err();
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_setup_rejects_codec_of_other_identity_kind() {
        let config = BusConfig::new(0x10, 0x20);
        let codec = Box::new(TaggedFraming::new(IdentityKind::Symbolic, 32));
        let err = BusAdapter::setup(config, LoopbackDriver::default(), codec).unwrap_err();
        assert!(matches!(err, CourierError::Config(_)));

        let codec = Box::new(TaggedFraming::new(IdentityKind::Numeric, 32));
        assert!(BusAdapter::setup(BusConfig::new(0x10, 0x20), LoopbackDriver::default(), codec).is_ok());
    }

    #[test]
    fn test_send_and_recv_values() {
        let mut bus = adapter(64);
        let id = MessageIdentity::Numeric(5);
        bus.register_subscription(id.clone(), 2, 32, OverflowPolicy::RejectNewest)
            .unwrap();
        bus.start().unwrap();

        bus.send_value(&id, &[1u8, 2, 3]).unwrap();
        let frame = bus.driver().sent[0].1.clone();
        bus.driver_mut().deliver(&frame);

        let value: Option<Vec<u8>> = bus.recv_value(&id).unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
        assert_eq!(bus.recv_value::<Vec<u8>>(&id).unwrap(), None);
        assert!(bus
            .recv_value::<u8>(&MessageIdentity::Numeric(6))
            .is_err());
    }
}
