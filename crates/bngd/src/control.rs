//! BngControl - the query surface used by the packet engine.

use crate::classify::{Classifier, L3Header};
use crate::profile::{AaaBackend, DeviceScope, ProfileCacheKind, ProfileError, SlaProfileRecord};
use crate::route::{RouteLookup, RouteShadowTable};
use bng_types::IpAddress;
use std::sync::Arc;
use tracing::trace;

/// Classification, gateway resolution and subscriber authorization.
///
/// Holds only read handles; the route table keeps being updated by its sync
/// task and the profile cache fills itself on demand.
pub struct BngControl<B> {
    classifier: Classifier,
    routes: RouteShadowTable,
    profiles: ProfileCacheKind<B>,
}

impl<B: AaaBackend> BngControl<B> {
    pub fn new(classifier: Classifier, routes: RouteShadowTable, profiles: ProfileCacheKind<B>) -> Self {
        Self {
            classifier,
            routes,
            profiles,
        }
    }

    /// Returns true when the packet must take the special path.
    pub fn classify(&self, header: &L3Header) -> bool {
        self.classifier.classify(header)
    }

    /// Returns the next-hop gateway for `destination`, `None` when the
    /// destination is on-link or unroutable.
    pub fn resolve_gateway(&self, destination: &IpAddress) -> Option<IpAddress> {
        let lookup = self.routes.lookup(destination);
        trace!(destination = %destination, ?lookup, "Resolved gateway");
        lookup.gateway()
    }

    /// Full longest-prefix-match result for `destination`.
    pub fn route_lookup(&self, destination: &IpAddress) -> RouteLookup {
        self.routes.lookup(destination)
    }

    /// Resolves the policy record of a subscriber profile.
    pub async fn authorize(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError> {
        self.profiles.get(scope, profile).await
    }

    pub fn routes(&self) -> &RouteShadowTable {
        &self.routes
    }

    pub fn profiles(&self) -> &ProfileCacheKind<B> {
        &self.profiles
    }
}
