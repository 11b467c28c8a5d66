//! Node configuration handling.

use std::fs;
use std::path::Path;
use std::time::Duration;

use cloak_net_connectivity::{DEFAULT_HARD_RESTART_THRESHOLD, RestartPolicyConfig};
use cloak_net_peers::{DEFAULT_MAX_PEERS, NetworkPeer, default_seeds};
use cloak_net_primitives::NetworkTag;
use eyre::{Result, WrapErr, ensure};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::args::NetworkArgs;

/// Default seconds between discovery rounds. Longer than the transport's own message timeout.
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 120;

/// Default capacity of the discovery input channel.
pub const DEFAULT_INBOUND_CAPACITY: usize = 1024;

pub const DEFAULT_MONITOR_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_BLOCK_THRESHOLD_SECS: u64 = 180;
pub const DEFAULT_SOFT_RESTART_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SOFT_RESTART_POLL_SECS: u64 = 10;

/// Configuration for the Cloak node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloakConfig {
    /// Overlay network configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Peer discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Connectivity monitor configuration
    #[serde(default)]
    pub monitor: MonitorConfig,
}

/// Network configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Overlay tag
    #[serde(default)]
    pub tag: NetworkTag,

    /// Maximum number of known peers
    #[serde(default = "default_max_known_peers")]
    pub max_known_peers: usize,

    /// Bootstrap seeds; the built-in seeds are used when empty
    #[serde(default)]
    pub seeds: Vec<SeedConfig>,
}

/// A configured bootstrap seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    pub address: String,
    pub fingerprint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_type: String,
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_interval")]
    pub interval_secs: u64,

    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,
}

/// Connectivity monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_monitor_interval")]
    pub interval_secs: u64,

    /// Seconds blocked before restarting
    #[serde(default = "default_block_threshold")]
    pub block_threshold_secs: u64,

    /// Soft restarts before a hard restart
    #[serde(default = "default_hard_restart_threshold")]
    pub hard_restart_threshold: u32,

    /// How long to wait for the transport after a soft restart
    #[serde(default = "default_soft_restart_timeout")]
    pub soft_restart_timeout_secs: u64,

    #[serde(default = "default_soft_restart_poll")]
    pub soft_restart_poll_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tag: NetworkTag::default(),
            max_known_peers: default_max_known_peers(),
            seeds: Vec::new(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_discovery_interval(),
            inbound_capacity: default_inbound_capacity(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_monitor_interval(),
            block_threshold_secs: default_block_threshold(),
            hard_restart_threshold: default_hard_restart_threshold(),
            soft_restart_timeout_secs: default_soft_restart_timeout(),
            soft_restart_poll_secs: default_soft_restart_poll(),
        }
    }
}

impl NetworkConfig {
    /// Seeds as peers on this network, falling back to the built-in seeds.
    pub fn seed_peers(&self) -> Vec<NetworkPeer> {
        if self.seeds.is_empty() {
            return default_seeds(&self.tag);
        }

        self.seeds
            .iter()
            .map(|seed| {
                NetworkPeer::new(self.tag.clone(), seed.address.clone(), seed.fingerprint.as_str())
                    .with_key_type(seed.key_type.clone())
            })
            .collect()
    }
}

impl DiscoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn soft_restart_timeout(&self) -> Duration {
        Duration::from_secs(self.soft_restart_timeout_secs)
    }

    pub fn soft_restart_poll(&self) -> Duration {
        Duration::from_secs(self.soft_restart_poll_secs)
    }

    pub fn restart_policy(&self) -> RestartPolicyConfig {
        RestartPolicyConfig {
            hard_restart_threshold: self.hard_restart_threshold,
            block_threshold: Duration::from_secs(self.block_threshold_secs),
        }
    }
}

impl CloakConfig {
    /// Load the configuration from `path`, or defaults if there is no file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => {
                debug!(path = %path.display(), "loading configuration");
                let content = fs::read_to_string(path)
                    .wrap_err_with(|| format!("failed to read {}", path.display()))?;
                let config: Self = toml::from_str(&content)
                    .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
                config
                    .validate()
                    .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
                Ok(config)
            }
            _ => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from the given path, or create a default one if it doesn't exist
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load(Some(path))
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save the configuration to the given path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
        }

        fs::write(path, self.to_toml()?)
            .wrap_err_with(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }

    /// Reject values the scheduler and channels cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.discovery.interval_secs > 0, "discovery.interval_secs must be positive");
        ensure!(self.discovery.inbound_capacity > 0, "discovery.inbound_capacity must be positive");
        ensure!(self.monitor.interval_secs > 0, "monitor.interval_secs must be positive");
        ensure!(
            self.monitor.soft_restart_poll_secs > 0,
            "monitor.soft_restart_poll_secs must be positive"
        );
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).wrap_err("failed to serialize configuration")
    }

    /// Apply command line arguments to override the configuration
    pub fn apply_args(&mut self, args: &NetworkArgs) {
        if let Some(tag) = &args.tag {
            self.network.tag = NetworkTag::new(tag);
        }
        if let Some(max_peers) = args.max_peers {
            self.network.max_known_peers = max_peers;
        }
        if !args.seeds.is_empty() {
            self.network.seeds = args.seeds.clone();
        }
        if let Some(secs) = args.discovery_interval {
            self.discovery.interval_secs = secs;
        }
        if let Some(secs) = args.monitor_interval {
            self.monitor.interval_secs = secs;
        }
    }
}

// Default value functions

fn default_max_known_peers() -> usize {
    DEFAULT_MAX_PEERS
}

fn default_discovery_interval() -> u64 {
    DEFAULT_DISCOVERY_INTERVAL_SECS
}

fn default_inbound_capacity() -> usize {
    DEFAULT_INBOUND_CAPACITY
}

fn default_monitor_interval() -> u64 {
    DEFAULT_MONITOR_INTERVAL_SECS
}

fn default_block_threshold() -> u64 {
    DEFAULT_BLOCK_THRESHOLD_SECS
}

fn default_hard_restart_threshold() -> u32 {
    DEFAULT_HARD_RESTART_THRESHOLD
}

fn default_soft_restart_timeout() -> u64 {
    DEFAULT_SOFT_RESTART_TIMEOUT_SECS
}

fn default_soft_restart_poll() -> u64 {
    DEFAULT_SOFT_RESTART_POLL_SECS
}
