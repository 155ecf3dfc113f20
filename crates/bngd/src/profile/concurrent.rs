//! Profile cache safe for concurrent callers.

use super::backend::AaaBackend;
use super::cache::{ProfileCache, check_scope, log_failure};
use super::error::ProfileError;
use super::types::{DeviceScope, ProfileKey, SlaProfileRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, trace};

/// Per-key slot; filled exactly once with a fully built record.
type Slot = Arc<OnceCell<Arc<SlaProfileRecord>>>;

/// Profile cache shareable across tasks through `&self`.
///
/// Concurrent misses on the same key are coalesced: the first caller
/// queries the backend while the rest wait on the key's slot and receive
/// the same record. If that query fails, the next waiter queries again, so
/// waiters never observe a failure they did not request themselves. The
/// last caller to give up on an empty slot drops it from the map.
pub struct ConcurrentProfileCache<B> {
    backend: B,
    scopes: Vec<DashMap<String, Slot>>,
}

impl<B: AaaBackend> ConcurrentProfileCache<B> {
    pub fn new(backend: B, max_device_scopes: u16) -> Self {
        Self {
            backend,
            scopes: (0..max_device_scopes).map(|_| DashMap::new()).collect(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the record for `profile` in `scope`, querying the backend on
    /// a miss.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError> {
        let index = check_scope(scope, self.scopes.len()).inspect_err(log_failure)?;
        let table = &self.scopes[index];

        // Read first so hits never take a shard write lock.
        let existing = table.get(profile).map(|slot| Arc::clone(slot.value()));
        let slot = match existing {
            Some(slot) => slot,
            None => Arc::clone(table.entry(profile.to_owned()).or_default().value()),
        };

        if let Some(record) = slot.get() {
            trace!("Profile cache hit");
            return Ok(Arc::clone(record));
        }

        let result = slot
            .get_or_try_init(|| async {
                debug!("Profile cache miss, querying AAA backend");
                self.backend.lookup_profile(scope, profile).await.map(Arc::new)
            })
            .await;

        match result {
            Ok(record) => Ok(Arc::clone(record)),
            Err(err) => {
                // Only the map and this caller hold the slot: nobody is
                // waiting to retry it.
                table.remove_if(profile, |_, current| {
                    Arc::ptr_eq(current, &slot)
                        && !current.initialized()
                        && Arc::strong_count(current) <= 2
                });
                let err = ProfileError::from_aaa(ProfileKey::new(scope, profile), err);
                log_failure(&err);
                Err(err)
            }
        }
    }

    /// Like [`get`](Self::get), folding every failure into `None`.
    pub async fn lookup(&self, scope: DeviceScope, profile: &str) -> Option<Arc<SlaProfileRecord>> {
        self.get(scope, profile).await.ok()
    }

    /// Returns true if a record for the key is already cached.
    pub fn contains(&self, scope: DeviceScope, profile: &str) -> bool {
        self.scopes
            .get(scope.index())
            .and_then(|table| table.get(profile))
            .is_some_and(|slot| slot.initialized())
    }

    /// Number of cached records. Slots with a lookup still in flight are
    /// not counted.
    pub fn len(&self) -> usize {
        self.scopes
            .iter()
            .flat_map(|table| table.iter())
            .filter(|slot| slot.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<B: AaaBackend> ProfileCache for ConcurrentProfileCache<B> {
    async fn get(
        &mut self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError> {
        ConcurrentProfileCache::get(self, scope, profile).await
    }

    fn contains(&self, scope: DeviceScope, profile: &str) -> bool {
        ConcurrentProfileCache::contains(self, scope, profile)
    }

    fn len(&self) -> usize {
        ConcurrentProfileCache::len(self)
    }
}
