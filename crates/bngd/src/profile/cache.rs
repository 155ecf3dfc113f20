//! The profile cache contract and runtime variant selection.

use super::backend::AaaBackend;
use super::concurrent::ConcurrentProfileCache;
use super::error::ProfileError;
use super::exclusive::ExclusiveProfileCache;
use super::types::{DeviceScope, SlaProfileRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Read-through cache of subscriber policy records.
///
/// A hit never touches the backend. A miss queries the backend once and,
/// on success, stores the record for the life of the cache. Errors are
/// returned to the caller and never stored.
#[async_trait]
pub trait ProfileCache: Send {
    /// Returns the record for `profile` in `scope`, querying the backend on
    /// a miss.
    async fn get(
        &mut self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError>;

    /// Like [`get`](Self::get), folding every failure into `None`.
    async fn lookup(&mut self, scope: DeviceScope, profile: &str) -> Option<Arc<SlaProfileRecord>> {
        self.get(scope, profile).await.ok()
    }

    /// Returns true if a record for the key is already cached.
    fn contains(&self, scope: DeviceScope, profile: &str) -> bool;

    /// Number of cached records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which cache variant the daemon runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    Exclusive,
    #[default]
    Concurrent,
}

/// A profile cache shareable through `&self`, whichever variant is selected.
///
/// The exclusive variant is serialized behind a mutex held across the
/// backend call.
pub enum ProfileCacheKind<B> {
    Exclusive(Mutex<ExclusiveProfileCache<B>>),
    Concurrent(ConcurrentProfileCache<B>),
}

impl<B: AaaBackend> ProfileCacheKind<B> {
    pub fn new(mode: CacheMode, backend: B, max_device_scopes: u16) -> Self {
        match mode {
            CacheMode::Exclusive => {
                Self::Exclusive(Mutex::new(ExclusiveProfileCache::new(backend, max_device_scopes)))
            }
            CacheMode::Concurrent => {
                Self::Concurrent(ConcurrentProfileCache::new(backend, max_device_scopes))
            }
        }
    }

    pub fn mode(&self) -> CacheMode {
        match self {
            Self::Exclusive(_) => CacheMode::Exclusive,
            Self::Concurrent(_) => CacheMode::Concurrent,
        }
    }

    pub async fn get(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError> {
        match self {
            Self::Exclusive(cache) => cache.lock().await.get(scope, profile).await,
            Self::Concurrent(cache) => cache.get(scope, profile).await,
        }
    }

    pub async fn len(&self) -> usize {
        match self {
            Self::Exclusive(cache) => cache.lock().await.len(),
            Self::Concurrent(cache) => cache.len(),
        }
    }
}

pub(super) fn check_scope(scope: DeviceScope, max: usize) -> Result<usize, ProfileError> {
    let index = scope.index();
    if index < max {
        Ok(index)
    } else {
        Err(ProfileError::InvalidScope { scope, max })
    }
}

pub(super) fn log_failure(err: &ProfileError) {
    match err {
        ProfileError::InvalidScope { .. } => warn!(error = %err, "Rejected profile lookup"),
        ProfileError::NotFound { .. } => debug!(error = %err, "Profile lookup failed"),
        ProfileError::NotAuthorized { .. } => info!(error = %err, "Profile lookup rejected"),
        ProfileError::Backend { .. } => warn!(error = %err, "Profile lookup failed"),
    }
}
