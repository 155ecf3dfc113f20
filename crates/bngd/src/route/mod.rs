//! Kernel route shadow table.
//!
//! This module keeps a local, read-optimized copy of the kernel routing
//! table. A single background task (see [`RouteSync`]) owns the kernel
//! subscription and is the only writer; any number of callers read through
//! [`RouteShadowTable`] handles.

mod source;
mod sync;
mod table;
mod types;

pub use source::KernelRoutes;
pub use sync::{
    DEFAULT_EVENT_QUEUE_DEPTH, DEFAULT_RECONCILE_INTERVAL, RouteSync, RouteSyncHandle,
    RouteSyncOptions,
};
pub use table::{RouteDump, RouteShadowTable};
pub use types::{AddressFamilyFilter, KernelRoute, RouteEvent, RouteLookup, RouteMessageType};
