//! Profile cache for single-task use.

use super::backend::AaaBackend;
use super::cache::{ProfileCache, check_scope, log_failure};
use super::error::ProfileError;
use super::types::{DeviceScope, ProfileKey, SlaProfileRecord};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Profile cache without internal synchronization.
///
/// `get` takes `&mut self`: only one lookup can be in flight at a time, and
/// sharing an instance across tasks requires an external lock.
pub struct ExclusiveProfileCache<B> {
    backend: B,
    scopes: Vec<HashMap<String, Arc<SlaProfileRecord>>>,
}

impl<B: AaaBackend> ExclusiveProfileCache<B> {
    pub fn new(backend: B, max_device_scopes: u16) -> Self {
        Self {
            backend,
            scopes: (0..max_device_scopes).map(|_| HashMap::new()).collect(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: AaaBackend> ProfileCache for ExclusiveProfileCache<B> {
    #[instrument(skip(self), level = "debug")]
    async fn get(
        &mut self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<Arc<SlaProfileRecord>, ProfileError> {
        let index = check_scope(scope, self.scopes.len()).inspect_err(log_failure)?;
        let table = &mut self.scopes[index];

        if let Some(record) = table.get(profile) {
            trace!("Profile cache hit");
            return Ok(Arc::clone(record));
        }

        debug!("Profile cache miss, querying AAA backend");
        match self.backend.lookup_profile(scope, profile).await {
            Ok(record) => {
                let record = Arc::new(record);
                table.insert(profile.to_owned(), Arc::clone(&record));
                debug!(profile_id = record.profile_id, "Cached profile");
                Ok(record)
            }
            Err(err) => {
                let err = ProfileError::from_aaa(ProfileKey::new(scope, profile), err);
                log_failure(&err);
                Err(err)
            }
        }
    }

    fn contains(&self, scope: DeviceScope, profile: &str) -> bool {
        self.scopes
            .get(scope.index())
            .is_some_and(|table| table.contains_key(profile))
    }

    fn len(&self) -> usize {
        self.scopes.iter().map(HashMap::len).sum()
    }
}
