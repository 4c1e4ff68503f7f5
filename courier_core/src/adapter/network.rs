//! Network adapter
//!
//! Messages travel on `base_topic || identity` topics. The adapter owns a
//! [`ConnectionSupervisor`]; `poll` recovers a dropped link and restores every
//! subscription topic before pumping the client again.

use super::{route_frame, AdapterMetrics, AtomicAdapterMetrics, TransportAdapter};
use crate::buffer::OverflowPolicy;
use crate::config::NetworkConfig;
use crate::error::{CourierError, CourierResult};
use crate::framing::{FramingCodec, TopicFraming, WireRef};
use crate::identity::{IdentityRef, MessageIdentity};
use crate::registry::{BufferHandle, RegistryError, SubscriberRegistry};
use crate::supervisor::{ConnectionState, ConnectionSupervisor, Delay, TickOutcome};
use crate::transport::NetworkClient;
use std::sync::Arc;

/// Adapter between a [`NetworkClient`] and a subscriber registry
pub struct NetworkAdapter<C: NetworkClient> {
    config: NetworkConfig,
    client: C,
    codec: Arc<TopicFraming>,
    registry: Arc<SubscriberRegistry>,
    supervisor: ConnectionSupervisor,
    metrics: Arc<AtomicAdapterMetrics>,
    callback_installed: bool,
    resubscribe_pending: bool,
    started: bool,
}

impl<C: NetworkClient> NetworkAdapter<C> {
    /// Create an adapter and register the subscriptions listed in `config`.
    /// Does not connect; that happens in `start`.
    pub fn setup(config: NetworkConfig, client: C) -> CourierResult<Self> {
        config.validate()?;
        let registry = SubscriberRegistry::new(config.identity_kind, config.max_subscriptions)?;
        let codec = TopicFraming::new(
            config.publish_base.clone(),
            config.subscribe_base.clone(),
            config.identity_kind,
            config.max_payload,
        );
        let supervisor = ConnectionSupervisor::new(config.client_id.clone(), config.retry_interval())
            .with_max_attempts(config.max_attempts)?;

        log::info!(
            "Network adapter for '{}' (publish '{}*', subscribe '{}*')",
            config.client_id,
            config.publish_base,
            config.subscribe_base
        );

        let subscriptions = config.subscriptions.clone();
        let mut adapter = Self {
            config,
            client,
            codec: Arc::new(codec),
            registry: Arc::new(registry),
            supervisor,
            metrics: Arc::new(AtomicAdapterMetrics::default()),
            callback_installed: false,
            resubscribe_pending: false,
            started: false,
        };
        for subscription in &subscriptions {
            adapter.register(subscription)?;
        }
        Ok(adapter)
    }

    /// Replace the wait used between connection attempts
    pub fn with_delay(mut self, delay: impl Delay + 'static) -> Self {
        self.supervisor = self.supervisor.with_delay(delay);
        self
    }

    /// Subscription topics in registration order
    pub fn subscription_topics(&self) -> Vec<String> {
        self.registry
            .identities()
            .map(|identity| self.codec.subscription_topic(identity))
            .collect()
    }

    fn subscribe_all(&mut self) -> CourierResult<()> {
        for topic in self.subscription_topics() {
            if !self.client.subscribe(&topic) {
                return Err(CourierError::adapter(format!(
                    "subscription to '{}' was refused",
                    topic
                )));
            }
            log::debug!("Subscribed to '{}'", topic);
        }
        Ok(())
    }

    fn install_callback(&mut self) {
        let registry = Arc::clone(&self.registry);
        let codec = Arc::clone(&self.codec);
        let metrics = Arc::clone(&self.metrics);
        self.client
            .set_callback(Box::new(move |topic: &str, body: &[u8]| {
                metrics.frame_received();
                route_frame(&*codec, &registry, &metrics, WireRef::addressed(topic, body));
            }));
        self.callback_installed = true;
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    pub fn supervisor(&self) -> &ConnectionSupervisor {
        &self.supervisor
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    pub fn codec(&self) -> &TopicFraming {
        &self.codec
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }
}

impl<C: NetworkClient> TransportAdapter for NetworkAdapter<C> {
    fn transport_name(&self) -> &'static str {
        "network"
    }

    fn register_subscription(
        &mut self,
        identity: MessageIdentity,
        capacity: usize,
        slot_size: usize,
        policy: OverflowPolicy,
    ) -> CourierResult<BufferHandle> {
        let registry = Arc::get_mut(&mut self.registry).ok_or(RegistryError::Sealed)?;
        Ok(registry.register(identity, capacity, slot_size, policy)?)
    }

    /// Seal the registry, connect (blocking), install the callback and
    /// subscribe every registered topic.
    fn start(&mut self) -> CourierResult<()> {
        if self.started {
            return Ok(());
        }
        if let Some(registry) = Arc::get_mut(&mut self.registry) {
            registry.seal();
        }

        self.supervisor.ensure_connected(&mut self.client)?;
        if !self.callback_installed {
            self.install_callback();
        }
        self.subscribe_all()?;

        self.started = true;
        log::info!(
            "Network adapter started with {} subscription(s)",
            self.registry.len()
        );
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.started
    }

    fn send(&mut self, identity: &MessageIdentity, payload: &[u8]) -> CourierResult<()> {
        let wire = match self.codec.encode(identity, payload) {
            Ok(wire) => wire,
            Err(err) => {
                self.metrics.send_failure();
                return Err(err.into());
            }
        };
        let topic = wire.address.unwrap_or_default();

        if self.client.publish(&topic, &wire.body) {
            self.metrics.sent();
            Ok(())
        } else {
            self.metrics.send_failure();
            log::warn!("Publish to '{}' failed", topic);
            Err(CourierError::send_failed(
                self.transport_name(),
                format!("publish to '{}' was refused", topic),
            ))
        }
    }

    /// Recover the link if it dropped, otherwise pump the client once.
    ///
    /// Blocks while reconnecting. Must not be called from a receive callback.
    fn poll(&mut self) -> CourierResult<()> {
        if !self.started {
            return Err(CourierError::adapter("network adapter polled before start"));
        }

        if self.supervisor.periodic_tick(&mut self.client)? == TickOutcome::Reconnected {
            self.metrics.reconnected();
            self.resubscribe_pending = true;
        }

        if self.resubscribe_pending {
            match self.subscribe_all() {
                Ok(()) => self.resubscribe_pending = false,
                Err(err) => log::warn!("Restoring subscriptions failed, will retry: {}", err),
            }
        }
        Ok(())
    }

    fn lookup(&self, identity: IdentityRef<'_>) -> Option<BufferHandle> {
        self.registry.lookup(identity)
    }

    fn metrics(&self) -> AdapterMetrics {
        self.metrics.snapshot()
    }
}

impl<C: NetworkClient> std::fmt::Debug for NetworkAdapter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkAdapter")
            .field("client_id", &self.config.client_id)
            .field("state", &self.supervisor.state())
            .field("subscriptions", &self.registry.len())
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
