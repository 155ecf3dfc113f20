//! Configuration file support for bngd
//!
//! Loads and validates bngd configuration from TOML files.
//! Default location: /etc/bngd/bngd.toml

use crate::error::{BngError, Result};
use crate::profile::{CacheMode, SlaProfileRecord};
use crate::route::{AddressFamilyFilter, RouteSyncOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/etc/bngd/bngd.toml";

/// Route shadow table configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Idle time before the kernel table is re-listed, in milliseconds
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_ms: u64,

    /// Address families to mirror
    #[serde(default)]
    pub address_family: AddressFamilyFilter,

    /// Capacity of the kernel event channel
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,
}

/// Profile cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub cache_mode: CacheMode,

    /// Number of device scopes; valid scopes are `0..max_device_scopes`
    #[serde(default = "default_max_device_scopes")]
    pub max_device_scopes: u16,

    /// Profiles provisioned into the in-process AAA backend
    #[serde(default)]
    pub static_profiles: Vec<SlaProfileRecord>,
}

/// Packet classifier configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Send only ARP and ICMP/ICMPv6 to the special path
    #[serde(default)]
    pub control_only: bool,
}

/// Complete bngd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BngdConfig {
    #[serde(default)]
    pub route: RouteConfig,

    #[serde(default)]
    pub profile: ProfileConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

fn default_reconcile_interval() -> u64 {
    2000
}

fn default_event_queue_depth() -> usize {
    1024
}

fn default_max_device_scopes() -> u16 {
    10
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_ms: default_reconcile_interval(),
            address_family: AddressFamilyFilter::default(),
            event_queue_depth: default_event_queue_depth(),
        }
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            cache_mode: CacheMode::default(),
            max_device_scopes: default_max_device_scopes(),
            static_profiles: Vec::new(),
        }
    }
}

impl BngdConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                BngError::Config(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(BngError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BngError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Get reconcile interval as Duration
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.route.reconcile_interval_ms)
    }

    /// Route sync tunables derived from the `[route]` section
    pub fn route_sync_options(&self) -> RouteSyncOptions {
        RouteSyncOptions {
            family: self.route.address_family,
            reconcile_interval: self.reconcile_interval(),
            event_queue_depth: self.route.event_queue_depth,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.route.reconcile_interval_ms == 0 {
            return Err(BngError::Config(
                "reconcile_interval_ms must be > 0".to_string(),
            ));
        }

        if self.route.event_queue_depth == 0 {
            return Err(BngError::Config(
                "event_queue_depth must be > 0".to_string(),
            ));
        }

        if self.profile.max_device_scopes == 0 {
            return Err(BngError::Config(
                "max_device_scopes must be > 0".to_string(),
            ));
        }

        for record in &self.profile.static_profiles {
            if record.device_scope.0 >= self.profile.max_device_scopes {
                return Err(BngError::Config(format!(
                    "static profile {} uses device scope {} (max_device_scopes = {})",
                    record.profile_name, record.device_scope, self.profile.max_device_scopes
                )));
            }
        }

        Ok(())
    }
}
