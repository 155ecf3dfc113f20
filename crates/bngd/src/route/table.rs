//! RouteShadowTable - local copy of the kernel routing table.

use super::types::{KernelRoute, RouteEvent, RouteLookup, RouteMessageType};
use bng_types::{IpAddress, IpPrefix};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Destination prefix to next-hop gateway (`None` for on-link routes).
type RouteMap = HashMap<IpPrefix, Option<IpAddress>>;

/// Shared handle to the route shadow table.
///
/// Cloning the handle is cheap; all clones see the same table. Each
/// destination maps to exactly one gateway (last write wins). The default
/// entries `0.0.0.0/0` and `::/0` always exist, with an absent gateway until
/// the kernel supplies one.
#[derive(Debug, Clone)]
pub struct RouteShadowTable {
    inner: Arc<RwLock<RouteMap>>,
}

impl Default for RouteShadowTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteShadowTable {
    /// Creates a table holding only the default entries.
    pub fn new() -> Self {
        let mut routes = RouteMap::new();
        routes.insert(IpPrefix::DEFAULT_V4, None);
        routes.insert(IpPrefix::DEFAULT_V6, None);
        Self {
            inner: Arc::new(RwLock::new(routes)),
        }
    }

    /// Applies a single kernel change notification.
    pub fn apply_event(&self, event: &RouteEvent) {
        match event.kind {
            RouteMessageType::Added => self.upsert(&event.route),
            RouteMessageType::Removed => {
                self.remove(&event.route.key());
            }
        }
    }

    /// Inserts or replaces the gateway for a route's destination.
    pub fn upsert(&self, route: &KernelRoute) {
        let key = route.key();
        debug!(prefix = %key, gateway = ?route.gateway, "Route added");
        self.inner.write().insert(key, route.gateway);
    }

    /// Removes a destination, returning true if it was present.
    ///
    /// Default prefixes are never removed; their gateway is cleared instead
    /// and the return value reports whether one was set.
    pub fn remove(&self, prefix: &IpPrefix) -> bool {
        let mut routes = self.inner.write();
        if prefix.is_default() {
            let existed = routes.insert(*prefix, None).flatten().is_some();
            debug!(prefix = %prefix, "Default route gateway cleared");
            return existed;
        }

        let removed = routes.remove(prefix).is_some();
        if removed {
            debug!(prefix = %prefix, "Route deleted");
        } else {
            trace!(prefix = %prefix, "Route delete for unknown destination");
        }
        removed
    }

    /// Merges a full kernel listing into the table.
    ///
    /// Every destination present in the listing is overwritten with the
    /// listed gateway; destinations absent from the listing are left alone.
    /// Returns the number of entries whose value changed.
    pub fn merge(&self, listing: &[KernelRoute]) -> usize {
        let mut routes = self.inner.write();
        let mut changed = 0;
        for route in listing {
            let key = route.key();
            if routes.insert(key, route.gateway) != Some(route.gateway) {
                changed += 1;
            }
        }
        changed
    }

    /// Longest-prefix-match lookup for a destination address.
    ///
    /// Only destinations of the same address family are considered.
    pub fn lookup(&self, destination: &IpAddress) -> RouteLookup {
        let routes = self.inner.read();
        routes
            .iter()
            .filter(|(prefix, _)| prefix.contains(destination))
            .max_by_key(|(prefix, _)| prefix.prefix_len())
            .map(|(prefix, gateway)| RouteLookup::Matched {
                prefix: *prefix,
                gateway: *gateway,
            })
            .unwrap_or(RouteLookup::NoRoute)
    }

    /// Resolves the next-hop gateway for a destination.
    ///
    /// Returns `None` both for on-link destinations and when no route
    /// matches; use [`lookup`](Self::lookup) to tell the two apart.
    pub fn resolve_gateway(&self, destination: &IpAddress) -> Option<IpAddress> {
        self.lookup(destination).gateway()
    }

    /// Returns the gateway stored for an exact destination key.
    pub fn get(&self, prefix: &IpPrefix) -> Option<Option<IpAddress>> {
        self.inner.read().get(prefix).copied()
    }

    /// Returns true if the exact destination is present.
    pub fn contains(&self, prefix: &IpPrefix) -> bool {
        self.inner.read().contains_key(prefix)
    }

    /// Returns the number of cached destinations, default entries included.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Returns true if the table holds no destinations.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Returns a sorted point-in-time copy of the table.
    pub fn snapshot(&self) -> Vec<KernelRoute> {
        let mut routes: Vec<KernelRoute> = self
            .inner
            .read()
            .iter()
            .map(|(prefix, gateway)| KernelRoute::new(*prefix, *gateway))
            .collect();
        routes.sort();
        routes
    }
}

/// Human-readable rendering of a route listing for diagnostics.
pub struct RouteDump<'a> {
    pub title: &'a str,
    pub routes: &'a [KernelRoute],
}

impl fmt::Display for RouteDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "------- {} ({} entries) -------", self.title, self.routes.len())?;
        for route in self.routes {
            match route.gateway {
                Some(gateway) => writeln!(f, "key={}, gateway={}", route.key(), gateway)?,
                None => writeln!(f, "key={}, gateway=<on-link>", route.key())?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn route(dst: &str, gw: Option<&str>) -> KernelRoute {
        KernelRoute::new(dst.parse().unwrap(), gw.map(|g| g.parse().unwrap()))
    }

    fn addr(s: &str) -> IpAddress {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_table_has_defaults() {
        let table = RouteShadowTable::new();
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(&IpPrefix::DEFAULT_V4), Some(None));
        assert_eq!(table.get(&IpPrefix::DEFAULT_V6), Some(None));
    }

    #[test]
    fn test_longest_prefix_match() {
        let table = RouteShadowTable::new();
        table.merge(&[
            route("0.0.0.0/0", Some("192.168.0.1")),
            route("10.0.0.0/8", Some("10.255.255.1")),
            route("10.1.0.0/16", Some("10.1.255.1")),
            route("10.1.2.0/24", None),
        ]);

        assert_eq!(table.resolve_gateway(&addr("10.9.9.9")), Some(addr("10.255.255.1")));
        assert_eq!(table.resolve_gateway(&addr("10.1.9.9")), Some(addr("10.1.255.1")));
        assert_eq!(table.resolve_gateway(&addr("8.8.8.8")), Some(addr("192.168.0.1")));

        match table.lookup(&addr("10.1.2.3")) {
            RouteLookup::Matched { prefix, gateway } => {
                assert_eq!(prefix.to_string(), "10.1.2.0/24");
                assert_eq!(gateway, None);
            }
            RouteLookup::NoRoute => panic!("expected on-link match"),
        }
    }

    #[test]
    fn test_lookup_does_not_cross_families() {
        let table = RouteShadowTable::new();
        table.merge(&[route("2001:db8::/32", Some("fe80::1"))]);

        let lookup = table.lookup(&addr("10.0.0.1"));
        assert!(lookup.is_default());
        assert_eq!(lookup.gateway(), None);

        assert_eq!(table.resolve_gateway(&addr("2001:db8::5")), Some(addr("fe80::1")));
    }

    #[test]
    fn test_lookup_without_defaults_reports_no_route() {
        let table = RouteShadowTable {
            inner: Arc::new(RwLock::new(RouteMap::new())),
        };
        assert_eq!(table.lookup(&addr("10.0.0.1")), RouteLookup::NoRoute);
    }

    #[test]
    fn test_remove_default_clears_gateway() {
        let table = RouteShadowTable::new();
        table.upsert(&route("0.0.0.0/0", Some("192.168.0.1")));

        assert!(table.remove(&IpPrefix::DEFAULT_V4));
        assert_eq!(table.get(&IpPrefix::DEFAULT_V4), Some(None));
        assert!(!table.remove(&IpPrefix::DEFAULT_V4));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let table = RouteShadowTable::new();
        assert!(!table.remove(&"172.16.0.0/12".parse().unwrap()));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_merge_counts_changes() {
        let table = RouteShadowTable::new();
        let listing = [route("10.0.0.0/24", Some("1.1.1.1")), route("0.0.0.0/0", None)];

        assert_eq!(table.merge(&listing), 1);
        assert_eq!(table.merge(&listing), 0);

        assert_eq!(table.merge(&[route("10.0.0.0/24", Some("1.1.1.9"))]), 1);
    }

    #[test]
    fn test_snapshot_sorted() {
        let table = RouteShadowTable::new();
        table.merge(&[route("10.0.1.0/24", None), route("10.0.0.0/24", Some("1.1.1.1"))]);

        let keys: Vec<String> = table.snapshot().iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, vec!["0.0.0.0/0", "10.0.0.0/24", "10.0.1.0/24", "::/0"]);
    }

    #[test]
    fn test_route_dump_rendering() {
        let routes = [route("10.0.0.0/24", Some("1.1.1.1")), route("10.0.1.0/24", None)];
        let text = RouteDump {
            title: "Route Cache",
            routes: &routes,
        }
        .to_string();

        assert!(text.starts_with("------- Route Cache (2 entries) -------"));
        assert!(text.contains("key=10.0.0.0/24, gateway=1.1.1.1"));
        assert!(text.contains("key=10.0.1.0/24, gateway=<on-link>"));
    }
}
