//! BNG control-plane caches
//!
//! This crate provides the control-plane state a broadband network gateway
//! consults on its packet path:
//!
//! - a **route shadow table** mirroring the kernel routing table, kept
//!   current by a netlink subscription plus an idle-time full re-listing;
//! - a **profile cache** mapping a subscriber profile to its SLA policy
//!   record (ACL and QoS), filled on demand from an AAA backend;
//! - a **classifier** deciding which packets leave the fast path.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────────────┐     ┌─────────────────┐
//! │  Linux Kernel   │     │          bngd            │     │   AAA backend   │
//! │                 │     │                          │     │                 │
//! │  RTM_NEWROUTE   │────▶│  RouteSync ─▶ RouteShadow│     │  lookup_profile │
//! │  RTM_DELROUTE   │     │               Table      │     │        ▲        │
//! │  RTM_GETROUTE   │◀────│  (2s idle reconcile)     │     │        │        │
//! └─────────────────┘     │                          │     │        │        │
//!                         │  ProfileCache ───────────┼─────┼────────┘        │
//!                         │  (miss → backend)        │     └─────────────────┘
//!                         │                          │
//!                         │  BngControl: classify,   │
//!                         │  resolve_gateway,        │
//!                         │  authorize               │
//!                         └──────────────────────────┘
//! ```

pub mod classify;
pub mod config;
pub mod control;
pub mod error;
pub mod netlink;
pub mod profile;
pub mod route;

pub use classify::{Classifier, L3Header};
pub use config::BngdConfig;
pub use control::BngControl;
pub use error::{BngError, Result};
pub use netlink::NetlinkRouteSource;
pub use profile::{
    AaaBackend, AaaError, CacheMode, ConcurrentProfileCache, DeviceScope, ExclusiveProfileCache,
    ProfileCache, ProfileCacheKind, ProfileError, ProfileKey, SlaProfileRecord, StaticProfileDb,
};
pub use route::{
    AddressFamilyFilter, KernelRoute, KernelRoutes, RouteEvent, RouteLookup, RouteShadowTable,
    RouteSync, RouteSyncHandle, RouteSyncOptions,
};
