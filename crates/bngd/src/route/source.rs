//! Kernel routing subsystem contract.

use super::types::{AddressFamilyFilter, KernelRoute, RouteEvent};
use crate::error::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Source of kernel routing state.
///
/// The Linux implementation is [`NetlinkRouteSource`](crate::netlink::NetlinkRouteSource);
/// tests provide in-memory implementations.
#[async_trait]
pub trait KernelRoutes: Send + Sync + 'static {
    /// Returns a full listing of the kernel routes for the given families.
    async fn list_routes(&self, family: AddressFamilyFilter) -> Result<Vec<KernelRoute>>;

    /// Opens a route change subscription.
    ///
    /// Events are delivered in kernel order through a bounded channel of
    /// `queue_depth` entries. Dropping the receiver closes the subscription.
    async fn subscribe(
        &self,
        family: AddressFamilyFilter,
        queue_depth: usize,
    ) -> Result<mpsc::Receiver<RouteEvent>>;
}
