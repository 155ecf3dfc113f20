//! Route types and data structures.

use bng_types::{IpAddress, IpPrefix};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A route as reported by the kernel, either from a full listing or from a
/// change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KernelRoute {
    /// Destination prefix; `None` when the kernel message carried no
    /// destination attribute.
    pub destination: Option<IpPrefix>,
    /// Next-hop gateway; `None` for on-link routes.
    pub gateway: Option<IpAddress>,
}

impl KernelRoute {
    /// Creates a route with an explicit destination.
    pub fn new(destination: IpPrefix, gateway: Option<IpAddress>) -> Self {
        Self {
            destination: Some(destination),
            gateway,
        }
    }

    /// Returns the table key for this route.
    ///
    /// A route without a destination is the default route of its family. The
    /// family is taken from the gateway when there is one, IPv4 otherwise.
    pub fn key(&self) -> IpPrefix {
        match (self.destination, self.gateway) {
            (Some(prefix), _) => prefix,
            (None, Some(gateway)) => IpPrefix::default_for(&gateway),
            (None, None) => IpPrefix::DEFAULT_V4,
        }
    }
}

impl fmt::Display for KernelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.gateway {
            Some(gateway) => write!(f, "{} via {}", self.key(), gateway),
            None => write!(f, "{} on-link", self.key()),
        }
    }
}

/// Kind of route change notification (RTM_NEWROUTE / RTM_DELROUTE).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMessageType {
    Added,
    Removed,
}

/// A single route change notification from the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEvent {
    pub kind: RouteMessageType,
    pub route: KernelRoute,
}

impl RouteEvent {
    pub fn added(route: KernelRoute) -> Self {
        Self {
            kind: RouteMessageType::Added,
            route,
        }
    }

    pub fn removed(route: KernelRoute) -> Self {
        Self {
            kind: RouteMessageType::Removed,
            route,
        }
    }
}

/// Address families to include in listings and subscriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamilyFilter {
    #[default]
    All,
    Ipv4,
    Ipv6,
}

impl AddressFamilyFilter {
    /// Returns true if routes for `prefix` pass this filter.
    pub fn matches(&self, prefix: &IpPrefix) -> bool {
        match self {
            Self::All => true,
            Self::Ipv4 => prefix.is_ipv4(),
            Self::Ipv6 => prefix.is_ipv6(),
        }
    }
}

/// Result of a longest-prefix-match lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteLookup {
    /// The most specific cached destination covering the address.
    Matched {
        prefix: IpPrefix,
        gateway: Option<IpAddress>,
    },
    /// No cached destination covers the address.
    NoRoute,
}

impl RouteLookup {
    /// Returns the gateway of the matched route, if any.
    pub fn gateway(&self) -> Option<IpAddress> {
        match self {
            Self::Matched { gateway, .. } => *gateway,
            Self::NoRoute => None,
        }
    }

    /// Returns true if the match is a default route.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Matched { prefix, .. } if prefix.is_default())
    }
}
