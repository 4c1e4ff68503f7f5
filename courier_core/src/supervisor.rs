//! Connection supervision for networked transports
//!
//! ```text
//! Disconnected --connect ok--> Connected
//! Connected --link loss--> Disconnected
//! Disconnected --connect fails--> Disconnected (retry after retry_interval)
//! ```
//!
//! `Connecting` is only observable while an attempt is in flight.
//! [`ConnectionSupervisor::ensure_connected`] blocks until the link is up
//! (or `max_attempts` run out) and must never be called from a receive
//! notification.

use crate::transport::NetworkClient;
use std::time::Duration;
use thiserror::Error;

/// Default wait between connection attempts
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Link state owned by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("gave up connecting after {attempts} attempt(s)")]
    AttemptsExhausted { attempts: u32 },

    #[error("invalid supervisor configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Wait between connection attempts
pub trait Delay: Send {
    fn wait(&mut self, duration: Duration);
}

/// Sleeps the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// What a [`ConnectionSupervisor::periodic_tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Link was up; the client was pumped once
    Polled,
    /// Link was down and has been re-established; subscriptions must be restored
    Reconnected,
}

/// Supervisor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub attempts: u64,
    pub failures: u64,
    pub reconnects: u64,
}

/// Link establishment and recovery for one network client
pub struct ConnectionSupervisor {
    client_id: String,
    retry_interval: Duration,
    max_attempts: Option<u32>,
    state: ConnectionState,
    ever_connected: bool,
    stats: SupervisorStats,
    delay: Box<dyn Delay>,
}

impl ConnectionSupervisor {
    /// Supervisor that retries forever, sleeping `retry_interval` between attempts
    pub fn new(client_id: impl Into<String>, retry_interval: Duration) -> Self {
        Self {
            client_id: client_id.into(),
            retry_interval,
            max_attempts: None,
            state: ConnectionState::Disconnected,
            ever_connected: false,
            stats: SupervisorStats::default(),
            delay: Box::new(ThreadDelay),
        }
    }

    /// Give up after `max_attempts` consecutive failures. `None` retries forever.
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Result<Self, SupervisorError> {
        if max_attempts == Some(0) {
            return Err(SupervisorError::InvalidConfig("max_attempts must be non-zero"));
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    /// Replace the inter-attempt wait
    pub fn with_delay(mut self, delay: impl Delay + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Bring the link up, retrying until it is.
    ///
    /// Returns `Ok(false)` when the client was already connected and
    /// `Ok(true)` when a new session had to be established.
    pub fn ensure_connected<C>(&mut self, client: &mut C) -> Result<bool, SupervisorError>
    where
        C: NetworkClient + ?Sized,
    {
        if client.connected() {
            self.state = ConnectionState::Connected;
            return Ok(false);
        }
        if self.state == ConnectionState::Connected {
            log::warn!("Link lost for client '{}'", self.client_id);
        }
        self.state = ConnectionState::Disconnected;

        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            self.stats.attempts += 1;
            self.state = ConnectionState::Connecting;
            log::info!(
                "Connecting as '{}' (attempt {})",
                self.client_id,
                attempts
            );

            if client.connect(&self.client_id) {
                self.state = ConnectionState::Connected;
                if self.ever_connected {
                    self.stats.reconnects += 1;
                    log::info!("Reconnected as '{}'", self.client_id);
                } else {
                    log::info!("Connected as '{}'", self.client_id);
                }
                self.ever_connected = true;
                return Ok(true);
            }

            self.stats.failures += 1;
            self.state = ConnectionState::Disconnected;

            if let Some(max) = self.max_attempts {
                if attempts >= max {
                    log::warn!(
                        "Giving up on '{}' after {} attempt(s)",
                        self.client_id,
                        attempts
                    );
                    return Err(SupervisorError::AttemptsExhausted { attempts });
                }
            }

            log::warn!(
                "Connect failed for '{}', retrying in {:?}",
                self.client_id,
                self.retry_interval
            );
            self.delay.wait(self.retry_interval);
        }
    }

    /// Main-loop hook: recover a lost link, otherwise pump the client once.
    pub fn periodic_tick<C>(&mut self, client: &mut C) -> Result<TickOutcome, SupervisorError>
    where
        C: NetworkClient + ?Sized,
    {
        if !client.connected() {
            self.ensure_connected(client)?;
            return Ok(TickOutcome::Reconnected);
        }
        self.state = ConnectionState::Connected;
        client.poll();
        Ok(TickOutcome::Polled)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn stats(&self) -> SupervisorStats {
        self.stats
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("client_id", &self.client_id)
            .field("retry_interval", &self.retry_interval)
            .field("max_attempts", &self.max_attempts)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::NetworkCallback;
    use std::sync::{Arc, Mutex};

    /// Client that fails the first `failures` connects
    #[derive(Default)]
    struct FlakyClient {
        failures: u32,
        connect_calls: u32,
        up: bool,
        polls: u32,
    }

    impl NetworkClient for FlakyClient {
        fn connect(&mut self, _client_id: &str) -> bool {
            self.connect_calls += 1;
            self.up = self.connect_calls > self.failures;
            self.up
        }

        fn connected(&self) -> bool {
            self.up
        }

        fn subscribe(&mut self, _topic: &str) -> bool {
            self.up
        }

        fn publish(&mut self, _topic: &str, _body: &[u8]) -> bool {
            self.up
        }

        fn set_callback(&mut self, _callback: NetworkCallback) {}

        fn poll(&mut self) {
            self.polls += 1;
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDelay(Arc<Mutex<Vec<Duration>>>);

    impl Delay for RecordingDelay {
        fn wait(&mut self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    fn supervisor(delay: &RecordingDelay) -> ConnectionSupervisor {
        ConnectionSupervisor::new("node-1", Duration::from_millis(250)).with_delay(delay.clone())
    }

    #[test]
    fn test_connects_on_third_attempt() {
        let delay = RecordingDelay::default();
        let mut sup = supervisor(&delay);
        let mut client = FlakyClient {
            failures: 2,
            ..Default::default()
        };

        assert_eq!(sup.ensure_connected(&mut client), Ok(true));
        assert_eq!(client.connect_calls, 3);
        assert_eq!(sup.state(), ConnectionState::Connected);
        assert_eq!(
            *delay.0.lock().unwrap(),
            vec![Duration::from_millis(250); 2]
        );
        assert_eq!(
            sup.stats(),
            SupervisorStats {
                attempts: 3,
                failures: 2,
                reconnects: 0
            }
        );
    }

    #[test]
    fn test_already_connected_is_noop() {
        let delay = RecordingDelay::default();
        let mut sup = supervisor(&delay);
        let mut client = FlakyClient::default();

        assert_eq!(sup.ensure_connected(&mut client), Ok(true));
        assert_eq!(sup.ensure_connected(&mut client), Ok(false));
        assert_eq!(client.connect_calls, 1);
        assert!(delay.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_max_attempts_exhausted() {
        let delay = RecordingDelay::default();
        let mut sup = supervisor(&delay).with_max_attempts(Some(3)).unwrap();
        let mut client = FlakyClient {
            failures: u32::MAX,
            ..Default::default()
        };

        assert_eq!(
            sup.ensure_connected(&mut client),
            Err(SupervisorError::AttemptsExhausted { attempts: 3 })
        );
        assert_eq!(sup.state(), ConnectionState::Disconnected);
        // No wait after the final failure
        assert_eq!(delay.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_zero_max_attempts_rejected() {
        let result = ConnectionSupervisor::new("x", DEFAULT_RETRY_INTERVAL).with_max_attempts(Some(0));
        assert!(matches!(result, Err(SupervisorError::InvalidConfig(_))));
    }

    #[test]
    fn test_tick_polls_when_connected() {
        let delay = RecordingDelay::default();
        let mut sup = supervisor(&delay);
        let mut client = FlakyClient::default();
        sup.ensure_connected(&mut client).unwrap();

        assert_eq!(sup.periodic_tick(&mut client), Ok(TickOutcome::Polled));
        assert_eq!(client.polls, 1);
    }

    #[test]
    fn test_tick_recovers_lost_link() {
        let delay = RecordingDelay::default();
        let mut sup = supervisor(&delay);
        let mut client = FlakyClient::default();
        sup.ensure_connected(&mut client).unwrap();

        client.up = false;
        assert_eq!(sup.periodic_tick(&mut client), Ok(TickOutcome::Reconnected));
        assert_eq!(client.polls, 0);
        assert_eq!(sup.state(), ConnectionState::Connected);
        assert_eq!(sup.stats().reconnects, 1);
    }
}
