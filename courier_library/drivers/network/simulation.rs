//! Simulation network client
//!
//! [`SimulationBroker`] is an in-memory loopback broker with exact topic
//! matching. Clients connect to it, subscribe, publish and receive their
//! messages from `poll`, like a real broker client library. A
//! [`SimulationClientHandle`] scripts faults: failing connects, refused
//! publishes or subscribes, and dropped links.

use courier_core::transport::{NetworkCallback, NetworkClient};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// A message as seen by the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Publishing client, or `None` for broker-side injections
    pub client_id: Option<String>,
    pub topic: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct Session {
    client_id: String,
    topics: Vec<String>,
    inbox: VecDeque<(String, Vec<u8>)>,
}

#[derive(Default)]
struct BrokerState {
    sessions: HashMap<u64, Session>,
    next_session: u64,
    published: Vec<PublishedMessage>,
}

impl BrokerState {
    fn route(&mut self, client_id: Option<&str>, topic: &str, body: &[u8]) -> usize {
        self.published.push(PublishedMessage {
            client_id: client_id.map(str::to_string),
            topic: topic.to_string(),
            body: body.to_vec(),
        });

        let mut delivered = 0;
        for session in self.sessions.values_mut() {
            if session.topics.iter().any(|t| t == topic) {
                session.inbox.push_back((topic.to_string(), body.to_vec()));
                delivered += 1;
            }
        }
        delivered
    }
}

/// In-memory loopback broker
#[derive(Clone, Default)]
pub struct SimulationBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl SimulationBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// New client attached to this broker (not yet connected)
    pub fn client(&self) -> SimulationNetworkClient {
        SimulationNetworkClient {
            broker: self.clone(),
            session: None,
            callback: None,
            script: Arc::new(Mutex::new(ClientScript::default())),
        }
    }

    /// Publish from outside any client. Returns the number of sessions reached.
    pub fn inject(&self, topic: &str, body: &[u8]) -> usize {
        self.state.lock().route(None, topic, body)
    }

    /// Every message published so far, oldest first
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Drain the published-message log
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.state.lock().published)
    }

    /// Number of live sessions subscribed to `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .lock()
            .sessions
            .values()
            .filter(|s| s.topics.iter().any(|t| t == topic))
            .count()
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        self.state.lock().sessions.len()
    }
}

#[derive(Debug, Default)]
struct ClientScript {
    connect_failures: u32,
    connect_attempts: u32,
    refuse_subscribe: bool,
    refuse_publish: bool,
}

/// Network client bound to a [`SimulationBroker`]
pub struct SimulationNetworkClient {
    broker: SimulationBroker,
    session: Option<u64>,
    callback: Option<NetworkCallback>,
    script: Arc<Mutex<ClientScript>>,
}

impl SimulationNetworkClient {
    /// Handle for scripting faults on this client
    pub fn handle(&self) -> SimulationClientHandle {
        SimulationClientHandle {
            broker: self.broker.clone(),
            script: Arc::clone(&self.script),
        }
    }

    pub fn broker(&self) -> &SimulationBroker {
        &self.broker
    }

    /// Drop the broker session, as if the link went away
    pub fn drop_link(&mut self) {
        if let Some(id) = self.session.take() {
            self.broker.state.lock().sessions.remove(&id);
        }
    }
}

impl NetworkClient for SimulationNetworkClient {
    fn connect(&mut self, client_id: &str) -> bool {
        {
            let mut script = self.script.lock();
            script.connect_attempts += 1;
            if script.connect_failures > 0 {
                script.connect_failures -= 1;
                return false;
            }
        }

        self.drop_link();
        let mut state = self.broker.state.lock();
        let id = state.next_session;
        state.next_session += 1;
        state.sessions.insert(
            id,
            Session {
                client_id: client_id.to_string(),
                ..Default::default()
            },
        );
        self.session = Some(id);
        true
    }

    fn connected(&self) -> bool {
        match self.session {
            Some(id) => self.broker.state.lock().sessions.contains_key(&id),
            None => false,
        }
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        if self.script.lock().refuse_subscribe {
            return false;
        }
        let Some(id) = self.session else {
            return false;
        };
        let mut state = self.broker.state.lock();
        match state.sessions.get_mut(&id) {
            Some(session) => {
                if !session.topics.iter().any(|t| t == topic) {
                    session.topics.push(topic.to_string());
                }
                true
            }
            None => false,
        }
    }

    fn publish(&mut self, topic: &str, body: &[u8]) -> bool {
        if self.script.lock().refuse_publish {
            return false;
        }
        let Some(id) = self.session else {
            return false;
        };
        let mut state = self.broker.state.lock();
        let Some(client_id) = state.sessions.get(&id).map(|s| s.client_id.clone()) else {
            return false;
        };
        state.route(Some(&client_id), topic, body);
        true
    }

    fn set_callback(&mut self, callback: NetworkCallback) {
        self.callback = Some(callback);
    }

    fn poll(&mut self) {
        let Some(id) = self.session else {
            return;
        };
        let inbox: Vec<(String, Vec<u8>)> = {
            let mut state = self.broker.state.lock();
            match state.sessions.get_mut(&id) {
                Some(session) => session.inbox.drain(..).collect(),
                None => return,
            }
        };
        if let Some(callback) = self.callback.as_mut() {
            for (topic, body) in &inbox {
                callback(topic.as_str(), body.as_slice());
            }
        }
    }
}

/// Fault-scripting handle for a [`SimulationNetworkClient`]
#[derive(Clone)]
pub struct SimulationClientHandle {
    broker: SimulationBroker,
    script: Arc<Mutex<ClientScript>>,
}

impl SimulationClientHandle {
    /// Fail the next `count` connect attempts
    pub fn fail_next_connects(&self, count: u32) {
        self.script.lock().connect_failures = count;
    }

    pub fn refuse_subscribe(&self, refuse: bool) {
        self.script.lock().refuse_subscribe = refuse;
    }

    pub fn refuse_publish(&self, refuse: bool) {
        self.script.lock().refuse_publish = refuse;
    }

    /// Connect attempts made so far, successful or not
    pub fn connect_attempts(&self) -> u32 {
        self.script.lock().connect_attempts
    }

    /// Drop every session belonging to `client_id`
    pub fn drop_link(&self, client_id: &str) {
        self.broker
            .state
            .lock()
            .sessions
            .retain(|_, s| s.client_id != client_id);
        log::debug!("Simulated link drop for '{}'", client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting(client: &mut SimulationNetworkClient) -> Arc<Mutex<Vec<(String, Vec<u8>)>>> {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        client.set_callback(Box::new(move |topic: &str, body: &[u8]| {
            sink.lock().push((topic.to_string(), body.to_vec()));
        }));
        received
    }

    #[test]
    fn test_loopback_delivery() {
        let broker = SimulationBroker::new();
        let mut a = broker.client();
        let mut b = broker.client();
        assert!(a.connect("a"));
        assert!(b.connect("b"));
        let received = collecting(&mut b);

        assert!(b.subscribe("x/1"));
        assert!(a.publish("x/1", b"hi"));
        assert!(a.publish("x/2", b"nobody"));
        assert!(received.lock().is_empty());

        b.poll();
        assert_eq!(*received.lock(), vec![("x/1".to_string(), b"hi".to_vec())]);
        assert_eq!(broker.published().len(), 2);
        assert_eq!(broker.published()[0].client_id.as_deref(), Some("a"));
        assert_eq!(broker.subscriber_count("x/1"), 1);
    }

    #[test]
    fn test_not_connected_refuses_everything() {
        let broker = SimulationBroker::new();
        let mut client = broker.client();
        assert!(!client.connected());
        assert!(!client.subscribe("t"));
        assert!(!client.publish("t", b""));
    }

    #[test]
    fn test_scripted_connect_failures() {
        let broker = SimulationBroker::new();
        let mut client = broker.client();
        let handle = client.handle();
        handle.fail_next_connects(2);

        assert!(!client.connect("c"));
        assert!(!client.connect("c"));
        assert!(client.connect("c"));
        assert_eq!(handle.connect_attempts(), 3);
    }

    #[test]
    fn test_link_drop_clears_session() {
        let broker = SimulationBroker::new();
        let mut client = broker.client();
        client.connect("c");
        client.subscribe("t");
        let handle = client.handle();

        handle.drop_link("c");
        assert!(!client.connected());
        assert_eq!(broker.session_count(), 0);
        assert_eq!(broker.inject("t", b"lost"), 0);

        // A new session starts without subscriptions
        assert!(client.connect("c"));
        assert_eq!(broker.subscriber_count("t"), 0);
    }

    #[test]
    fn test_refusals() {
        let broker = SimulationBroker::new();
        let mut client = broker.client();
        client.connect("c");
        let handle = client.handle();

        handle.refuse_publish(true);
        assert!(!client.publish("t", b"x"));
        handle.refuse_subscribe(true);
        assert!(!client.subscribe("t"));
        assert!(broker.take_published().is_empty());
    }
}
