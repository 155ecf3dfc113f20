//! Subscriber policy record types.

use bng_types::Ipv4Address;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a gateway device instance, used to namespace profiles.
///
/// Valid scopes are `0..N` where `N` is fixed by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceScope(pub u16);

impl DeviceScope {
    /// Returns the scope as a table index.
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for DeviceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u16> for DeviceScope {
    fn from(value: u16) -> Self {
        DeviceScope(value)
    }
}

/// Cache key: a device scope and a case-sensitive profile name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProfileKey {
    pub scope: DeviceScope,
    pub profile: String,
}

impl ProfileKey {
    pub fn new(scope: DeviceScope, profile: impl Into<String>) -> Self {
        Self {
            scope,
            profile: profile.into(),
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope, self.profile)
    }
}

/// Traffic direction an ACL rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    #[default]
    Uplink = 0,
    Downlink = 1,
}

/// Action taken on traffic matching an ACL rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AclAction {
    #[default]
    Drop = 0,
    Process = 1,
}

/// Firewall-style rule attached to a subscriber profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct AclProfile {
    pub rule_index: u8,
    pub direction: Direction,
    pub remote_ip: Ipv4Address,
    pub remote_port: u16,
    pub remote_protocol: u16,
    pub local_ip: Ipv4Address,
    pub local_port: u16,
    pub local_protocol: u16,
    pub action: AclAction,
    pub rating_group: u8,
    pub quota: u16,
}

impl Default for AclProfile {
    fn default() -> Self {
        Self {
            rule_index: 0,
            direction: Direction::Uplink,
            remote_ip: Ipv4Address::UNSPECIFIED,
            remote_port: 0,
            remote_protocol: 0,
            local_ip: Ipv4Address::UNSPECIFIED,
            local_port: 0,
            local_protocol: 0,
            action: AclAction::Drop,
            rating_group: 0,
            quota: 0,
        }
    }
}

/// Traffic-shaping parameters attached to a subscriber profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct QosProfile {
    pub profile_id: String,
    pub qos_index: u8,
    /// Committed information rate
    pub committed_rate: u16,
    /// Peak (maximum bit) rate
    pub peak_rate: u16,
}

/// SLA policy record for one subscriber profile.
///
/// Immutable once cached; callers share it through `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlaProfileRecord {
    pub device_scope: DeviceScope,
    pub profile_name: String,
    /// Backend-assigned numeric handle
    pub profile_id: u16,
    #[serde(default)]
    pub acl: AclProfile,
    #[serde(default)]
    pub qos: QosProfile,
}

impl SlaProfileRecord {
    /// Returns the cache key of this record.
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(self.device_scope, self.profile_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_key_display() {
        let key = ProfileKey::new(DeviceScope(3), "testuser1");
        assert_eq!(key.to_string(), "3:testuser1");
    }

    #[test]
    fn test_profile_key_case_sensitive() {
        let lower = ProfileKey::new(DeviceScope(0), "alice");
        let upper = ProfileKey::new(DeviceScope(0), "Alice");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_wire_values() {
        assert_eq!(Direction::Uplink as u8, 0);
        assert_eq!(Direction::Downlink as u8, 1);
        assert_eq!(AclAction::Drop as u8, 0);
        assert_eq!(AclAction::Process as u8, 1);
    }

    #[test]
    fn test_record_from_toml() {
        let record: SlaProfileRecord = toml::from_str(
            r#"
device_scope = 3
profile_name = "testuser1"
profile_id = 42

[acl]
direction = "downlink"
remote_ip = "13.91.95.74"
remote_port = 80
action = "process"

[qos]
profile_id = "gold"
committed_rate = 100
peak_rate = 200
"#,
        )
        .unwrap();

        assert_eq!(record.key(), ProfileKey::new(DeviceScope(3), "testuser1"));
        assert_eq!(record.acl.direction, Direction::Downlink);
        assert_eq!(record.acl.action, AclAction::Process);
        assert_eq!(record.acl.remote_ip, Ipv4Address::new(13, 91, 95, 74));
        assert_eq!(record.acl.local_ip, Ipv4Address::UNSPECIFIED);
        assert_eq!(record.qos.peak_rate, 200);
    }
}
