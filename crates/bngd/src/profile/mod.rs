//! Subscriber profile cache.
//!
//! Resolves a (device scope, profile name) pair to an SLA policy record,
//! querying the AAA backend on first reference and serving every later
//! request from memory. Two variants implement the [`ProfileCache`]
//! contract:
//!
//! - [`ExclusiveProfileCache`]: no internal locking; `get` takes `&mut self`,
//!   so the single-writer discipline is enforced at compile time.
//! - [`ConcurrentProfileCache`]: safe for any number of concurrent callers
//!   through `&self`; concurrent misses on the same key share one backend
//!   call.
//!
//! Successful lookups are cached for the life of the process. Failures are
//! never cached, so a profile provisioned later becomes visible on the next
//! call.

mod backend;
mod cache;
mod concurrent;
mod error;
mod exclusive;
mod static_db;
mod types;

pub use backend::AaaBackend;
pub use cache::{CacheMode, ProfileCache, ProfileCacheKind};
pub use concurrent::ConcurrentProfileCache;
pub use error::{AaaError, ProfileError};
pub use exclusive::ExclusiveProfileCache;
pub use static_db::StaticProfileDb;
pub use types::{
    AclAction, AclProfile, DeviceScope, Direction, ProfileKey, QosProfile, SlaProfileRecord,
};
