// Adapters running over the simulation drivers
use courier_core::supervisor::Delay;
use courier_core::{
    BusAdapter, BusConfig, ConnectionState, FramingKind, IdentityRef, MessageIdentity,
    NetworkAdapter, NetworkConfig, OverflowPolicy, SubscriptionConfig, TransportAdapter,
};
use courier_library::{
    SimulationBroker, SimulationBus, SimulationBusDriver, SimulationNetworkClient,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Telemetry {
    sensor: u8,
    millivolts: u32,
}

struct NoDelay;

impl Delay for NoDelay {
    fn wait(&mut self, _duration: Duration) {}
}

fn attached(segment: &SimulationBus, address: u8) -> SimulationBusDriver {
    let mut driver = segment.attach(address).unwrap();
    driver.init().unwrap();
    driver
}

// ============================================================================
// Bus
// ============================================================================

#[test]
fn test_two_bus_nodes_exchange_messages() {
    let segment = SimulationBus::new();
    let mut left = BusAdapter::from_config(BusConfig::new(0x10, 0x20), attached(&segment, 0x10))
        .unwrap();
    let mut right = BusAdapter::from_config(BusConfig::new(0x20, 0x10), attached(&segment, 0x20))
        .unwrap();

    let telemetry_id = MessageIdentity::Numeric(40);
    let ack_id = MessageIdentity::Numeric(41);
    let telemetry = right
        .register_subscription(telemetry_id.clone(), 4, 64, OverflowPolicy::RejectNewest)
        .unwrap();
    left.register_subscription(ack_id.clone(), 4, 8, OverflowPolicy::RejectNewest)
        .unwrap();
    left.start().unwrap();
    right.start().unwrap();

    let reading = Telemetry {
        sensor: 2,
        millivolts: 3300,
    };
    left.send_value(&telemetry_id, &reading).unwrap();
    assert_eq!(telemetry.len(), 1);

    let received: Telemetry = right.recv_value(&telemetry_id).unwrap().unwrap();
    assert_eq!(received, reading);

    right.send(&ack_id, b"ok").unwrap();
    let ack = left.lookup(IdentityRef::Numeric(41)).unwrap();
    assert_eq!(ack.dequeue().unwrap().payload, b"ok");

    let transmissions = segment.peer().transmissions();
    assert_eq!(transmissions.len(), 2);
    assert_eq!((transmissions[0].from, transmissions[0].to), (0x10, 0x20));
}

#[test]
fn test_json_framed_bus_node() {
    let segment = SimulationBus::new();
    let mut config = BusConfig::new(0x10, 0x20);
    config.framing = FramingKind::Json;
    config.subscriptions = vec![SubscriptionConfig::new(5u16, 2, 16)
        .with_policy(OverflowPolicy::EvictOldest)];
    let mut node = BusAdapter::from_config(config, attached(&segment, 0x10)).unwrap();
    node.start().unwrap();

    let peer = segment.peer();
    for celsius in ["20.5", "21.0", "21.5"] {
        let frame = format!(r#"{{"msgId":5,"payload":"{}"}}"#, celsius);
        assert!(peer.inject(0x10, frame.as_bytes()));
    }
    assert!(peer.inject(0x10, b"{not json"));

    let buffer = node.lookup(IdentityRef::Numeric(5)).unwrap();
    assert_eq!(buffer.dequeue().unwrap().payload, b"21.0");
    assert_eq!(buffer.dequeue().unwrap().payload, b"21.5");
    assert!(buffer.is_empty());

    let metrics = node.metrics();
    assert_eq!(metrics.frames_received, 4);
    assert_eq!(metrics.delivered, 3);
    assert_eq!(metrics.decode_errors, 1);
}

#[test]
fn test_bus_frames_injected_from_another_thread() {
    let driver = {
        let mut driver = SimulationBusDriver::new(0x10);
        driver.init().unwrap();
        driver
    };
    let peer = driver.peer();
    let mut node = BusAdapter::from_config(BusConfig::new(0x10, 0x20), driver).unwrap();
    let buffer = node
        .register_subscription(1u16.into(), 256, 4, OverflowPolicy::RejectNewest)
        .unwrap();
    node.start().unwrap();

    std::thread::spawn(move || {
        for n in 0u8..100 {
            let frame = [0x01, 0x00, 0x01, 0x00, 0x01, n];
            assert!(peer.inject(0x10, &frame));
        }
    })
    .join()
    .unwrap();

    let drained: Vec<u8> = std::iter::from_fn(|| buffer.dequeue())
        .map(|m| m.payload[0])
        .collect();
    assert_eq!(drained, (0u8..100).collect::<Vec<_>>());
}

#[test]
fn test_short_bus_write_is_a_send_failure() {
    let mut driver = SimulationBusDriver::new(0x10).with_tx_limit(4);
    driver.init().unwrap();
    let mut node = BusAdapter::from_config(BusConfig::new(0x10, 0x20), driver).unwrap();

    let err = node.send(&MessageIdentity::Numeric(1), b"payload").unwrap_err();
    assert!(err.is_send_failed());
    assert_eq!(node.metrics().send_failures, 1);
}

// ============================================================================
// Network
// ============================================================================

fn network_node(
    broker: &SimulationBroker,
    id: &str,
    out: &str,
    inbound: &str,
) -> NetworkAdapter<SimulationNetworkClient> {
    let config = NetworkConfig::new(id).with_topics(out, inbound);
    NetworkAdapter::setup(config, broker.client())
        .unwrap()
        .with_delay(NoDelay)
}

#[test]
fn test_network_nodes_exchange_over_broker() {
    let broker = SimulationBroker::new();
    let mut station = network_node(&broker, "station", "station/", "rover/");
    let mut rover = network_node(&broker, "rover", "rover/", "station/");

    let commands = rover
        .register_subscription(1u16.into(), 4, 32, OverflowPolicy::RejectNewest)
        .unwrap();
    station
        .register_subscription(2u16.into(), 4, 32, OverflowPolicy::RejectNewest)
        .unwrap();
    station.start().unwrap();
    rover.start().unwrap();

    station.send(&MessageIdentity::Numeric(1), b"forward").unwrap();
    rover.poll().unwrap();
    assert_eq!(commands.dequeue().unwrap().payload, b"forward");

    rover.send(&MessageIdentity::Numeric(2), b"done").unwrap();
    station.poll().unwrap();
    let status = station.lookup(IdentityRef::Numeric(2)).unwrap();
    assert_eq!(status.dequeue().unwrap().payload, b"done");

    let published = broker.published();
    assert_eq!(published[0].topic, "station/1");
    assert_eq!(published[1].topic, "rover/2");
}

#[test]
fn test_network_link_drop_recovers_subscriptions() {
    let broker = SimulationBroker::new();
    let mut node = network_node(&broker, "node", "node/out/", "node/in/");
    let buffer = node
        .register_subscription(3u16.into(), 4, 16, OverflowPolicy::RejectNewest)
        .unwrap();
    let handle = node.client().handle();
    handle.fail_next_connects(2);
    node.start().unwrap();
    assert_eq!(handle.connect_attempts(), 3);
    assert_eq!(broker.subscriber_count("node/in/3"), 1);

    handle.drop_link("node");
    handle.fail_next_connects(1);
    assert_eq!(broker.inject("node/in/3", b"lost"), 0);

    node.poll().unwrap();
    assert_eq!(node.connection_state(), ConnectionState::Connected);
    assert_eq!(broker.subscriber_count("node/in/3"), 1);
    assert_eq!(node.metrics().reconnects, 1);

    assert_eq!(broker.inject("node/in/3", b"back"), 1);
    node.poll().unwrap();
    assert_eq!(buffer.dequeue().unwrap().payload, b"back");
    assert!(buffer.is_empty());
}

#[test]
fn test_network_publish_refused() {
    let broker = SimulationBroker::new();
    let mut node = network_node(&broker, "node", "node/out/", "node/in/");
    node.start().unwrap();
    node.client().handle().refuse_publish(true);

    let err = node.send(&MessageIdentity::Numeric(1), b"x").unwrap_err();
    assert!(err.is_send_failed());
    assert!(broker.published().is_empty());
}
