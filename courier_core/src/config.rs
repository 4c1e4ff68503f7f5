//! Adapter configuration
//!
//! Configuration can be loaded from YAML or TOML files:
//!
//! ```yaml
//! bus:
//!   own_address: 0x10
//!   peer_address: 0x20
//!   framing: tagged
//!   subscriptions:
//!     - identity: 7
//!       capacity: 4
//!       slot_size: 32
//!       policy: evict_oldest
//! network:
//!   client_id: dock-controller
//!   publish_base: "dock/out/"
//!   subscribe_base: "dock/in/"
//!   retry_interval_ms: 5000
//! ```

use crate::buffer::OverflowPolicy;
use crate::error::{CourierError, CourierResult};
use crate::framing::FramingKind;
use crate::identity::{IdentityKind, MessageIdentity};
use crate::supervisor::DEFAULT_RETRY_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default number of subscriptions an adapter can hold
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 16;

/// Default payload ceiling in bytes
pub const DEFAULT_MAX_PAYLOAD: usize = 512;

fn default_capacity() -> usize {
    4
}

fn default_slot_size() -> usize {
    64
}

/// One subscription to register at setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionConfig {
    pub identity: MessageIdentity,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_slot_size")]
    pub slot_size: usize,
    #[serde(default)]
    pub policy: OverflowPolicy,
}

impl SubscriptionConfig {
    pub fn new(identity: impl Into<MessageIdentity>, capacity: usize, slot_size: usize) -> Self {
        Self {
            identity: identity.into(),
            capacity,
            slot_size,
            policy: OverflowPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: OverflowPolicy) -> Self {
        self.policy = policy;
        self
    }
}

fn check_subscriptions(
    section: &str,
    kind: IdentityKind,
    max_subscriptions: usize,
    subscriptions: &[SubscriptionConfig],
) -> CourierResult<()> {
    if max_subscriptions == 0 {
        return Err(CourierError::config(format!(
            "{}: max_subscriptions must be non-zero",
            section
        )));
    }
    if subscriptions.len() > max_subscriptions {
        return Err(CourierError::config(format!(
            "{}: {} subscriptions listed but max_subscriptions is {}",
            section,
            subscriptions.len(),
            max_subscriptions
        )));
    }
    for sub in subscriptions {
        if sub.identity.kind() != kind {
            return Err(CourierError::config(format!(
                "{}: subscription '{}' is {} but the adapter uses {} identities",
                section,
                sub.identity,
                sub.identity.kind(),
                kind
            )));
        }
    }
    Ok(())
}

/// Bus adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Address this node answers to on the bus
    pub own_address: u8,
    /// Default destination for outbound frames
    pub peer_address: u8,
    pub identity_kind: IdentityKind,
    pub framing: FramingKind,
    pub max_subscriptions: usize,
    pub max_payload: usize,
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            own_address: 0x08,
            peer_address: 0x09,
            identity_kind: IdentityKind::Numeric,
            framing: FramingKind::Tagged,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_payload: DEFAULT_MAX_PAYLOAD,
            subscriptions: Vec::new(),
        }
    }
}

impl BusConfig {
    pub fn new(own_address: u8, peer_address: u8) -> Self {
        Self {
            own_address,
            peer_address,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> CourierResult<()> {
        if self.max_payload == 0 {
            return Err(CourierError::config("bus: max_payload must be non-zero"));
        }
        if self.framing == FramingKind::Json && self.identity_kind == IdentityKind::Symbolic {
            return Err(CourierError::config(
                "bus: json framing only carries numeric identities",
            ));
        }
        check_subscriptions(
            "bus",
            self.identity_kind,
            self.max_subscriptions,
            &self.subscriptions,
        )
    }
}

/// Network adapter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub client_id: String,
    /// Prefix for outbound topics
    pub publish_base: String,
    /// Prefix for subscribed topics
    pub subscribe_base: String,
    pub identity_kind: IdentityKind,
    pub max_subscriptions: usize,
    pub max_payload: usize,
    pub retry_interval_ms: u64,
    /// Unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    pub subscriptions: Vec<SubscriptionConfig>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            client_id: "courier".to_string(),
            publish_base: String::new(),
            subscribe_base: String::new(),
            identity_kind: IdentityKind::Numeric,
            max_subscriptions: DEFAULT_MAX_SUBSCRIPTIONS,
            max_payload: DEFAULT_MAX_PAYLOAD,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL.as_millis() as u64,
            max_attempts: None,
            subscriptions: Vec::new(),
        }
    }
}

impl NetworkConfig {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }

    pub fn with_topics(
        mut self,
        publish_base: impl Into<String>,
        subscribe_base: impl Into<String>,
    ) -> Self {
        self.publish_base = publish_base.into();
        self.subscribe_base = subscribe_base.into();
        self
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn validate(&self) -> CourierResult<()> {
        if self.client_id.is_empty() {
            return Err(CourierError::config("network: client_id must not be empty"));
        }
        if self.max_payload == 0 {
            return Err(CourierError::config("network: max_payload must be non-zero"));
        }
        if self.max_attempts == Some(0) {
            return Err(CourierError::config(
                "network: max_attempts must be non-zero when set",
            ));
        }
        check_subscriptions(
            "network",
            self.identity_kind,
            self.max_subscriptions,
            &self.subscriptions,
        )
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourierConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<BusConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
}

impl CourierConfig {
    /// Load config from a file (auto-detects YAML or TOML by extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> CourierResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CourierError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let extension = path.extension().and_then(|s| s.to_str());
        let config = match extension {
            Some("toml") => Self::from_toml(&contents),
            Some("yaml") | Some("yml") => Self::from_yaml(&contents),
            _ => Self::from_yaml(&contents).or_else(|_| Self::from_toml(&contents)),
        }?;
        log::info!("Loaded courier config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate config from a YAML string
    pub fn from_yaml(contents: &str) -> CourierResult<Self> {
        let config: Self = serde_yaml::from_str(contents)
            .map_err(|e| CourierError::config(format!("Failed to parse YAML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from a TOML string
    pub fn from_toml(contents: &str) -> CourierResult<Self> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| CourierError::config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CourierResult<()> {
        if let Some(bus) = &self.bus {
            bus.validate()?;
        }
        if let Some(network) = &self.network {
            network.validate()?;
        }
        Ok(())
    }

    /// Standard config locations, in search order
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("courier.yaml"),
            PathBuf::from("courier.yml"),
            PathBuf::from("courier.toml"),
        ];
        if let Some(home) = dirs::home_dir() {
            let courier_dir = home.join(".courier");
            paths.push(courier_dir.join("courier.yaml"));
            paths.push(courier_dir.join("courier.toml"));
        }
        paths
    }

    /// Load the first config file found in the standard locations
    pub fn find_and_load() -> CourierResult<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Err(CourierError::config(
            "No courier config file found in standard locations",
        ))
    }

    /// Save config to a file (TOML for `.toml`, YAML otherwise)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> CourierResult<()> {
        let path = path.as_ref();
        let contents = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            _ => serde_yaml::to_string(self)?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Bus section, or an error naming what is missing
    pub fn bus(&self) -> CourierResult<&BusConfig> {
        self.bus
            .as_ref()
            .ok_or_else(|| CourierError::config("no [bus] section configured"))
    }

    /// Network section, or an error naming what is missing
    pub fn network(&self) -> CourierResult<&NetworkConfig> {
        self.network
            .as_ref()
            .ok_or_else(|| CourierError::config("no [network] section configured"))
    }
}
