//! In-process AAA backend backed by provisioning tables.

use super::backend::AaaBackend;
use super::error::{AaaError, ProfileError};
use super::types::{DeviceScope, SlaProfileRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Per-scope provisioning tables served as an AAA backend.
///
/// One table per device scope. Clones share the same tables, so a handle
/// kept by the operator interface can provision profiles while the caches
/// read through another.
#[derive(Debug, Clone)]
pub struct StaticProfileDb {
    scopes: Arc<RwLock<Vec<HashMap<String, SlaProfileRecord>>>>,
}

impl StaticProfileDb {
    /// Creates empty tables for scopes `0..max_device_scopes`.
    pub fn new(max_device_scopes: u16) -> Self {
        let scopes = (0..max_device_scopes).map(|_| HashMap::new()).collect();
        Self {
            scopes: Arc::new(RwLock::new(scopes)),
        }
    }

    /// Creates tables pre-populated with `records`.
    pub fn from_records<I>(max_device_scopes: u16, records: I) -> Result<Self, ProfileError>
    where
        I: IntoIterator<Item = SlaProfileRecord>,
    {
        let db = Self::new(max_device_scopes);
        for record in records {
            db.provision(record)?;
        }
        Ok(db)
    }

    /// Adds or replaces a profile, keyed by its scope and name.
    pub fn provision(&self, record: SlaProfileRecord) -> Result<(), ProfileError> {
        let mut scopes = self.scopes.write();
        let max = scopes.len();
        let scope = record.device_scope;
        let table = scopes
            .get_mut(scope.index())
            .ok_or(ProfileError::InvalidScope { scope, max })?;

        info!(scope = %scope, profile = %record.profile_name, "Provisioned profile");
        table.insert(record.profile_name.clone(), record);
        Ok(())
    }

    /// Withdraws a profile, returning true if it was provisioned.
    ///
    /// Records already handed to a cache stay cached.
    pub fn withdraw(&self, scope: DeviceScope, profile: &str) -> bool {
        let removed = self
            .scopes
            .write()
            .get_mut(scope.index())
            .and_then(|table| table.remove(profile))
            .is_some();
        if removed {
            info!(scope = %scope, profile, "Withdrew profile");
        }
        removed
    }

    /// Total number of provisioned profiles across all scopes.
    pub fn len(&self) -> usize {
        self.scopes.read().iter().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AaaBackend for StaticProfileDb {
    async fn lookup_profile(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<SlaProfileRecord, AaaError> {
        let scopes = self.scopes.read();
        match scopes.get(scope.index()).and_then(|table| table.get(profile)) {
            Some(record) => Ok(record.clone()),
            None => {
                debug!(scope = %scope, profile, "Profile not provisioned");
                Err(AaaError::NotFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::test_support::testuser1;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_lookup_provisioned_profile() {
        let db = StaticProfileDb::from_records(10, [testuser1()]).unwrap();

        let record = db.lookup_profile(DeviceScope(3), "testuser1").await.unwrap();
        assert_eq!(record, testuser1());
    }

    #[tokio::test]
    async fn test_lookup_is_scoped() {
        let db = StaticProfileDb::from_records(10, [testuser1()]).unwrap();

        let err = db.lookup_profile(DeviceScope(0), "testuser1").await.unwrap_err();
        assert_eq!(err, AaaError::NotFound);
        let err = db.lookup_profile(DeviceScope(0), "nosuchuser").await.unwrap_err();
        assert_eq!(err, AaaError::NotFound);
    }

    #[tokio::test]
    async fn test_lookup_out_of_range_scope() {
        let db = StaticProfileDb::new(2);
        let err = db.lookup_profile(DeviceScope(7), "testuser1").await.unwrap_err();
        assert_eq!(err, AaaError::NotFound);
    }

    #[test]
    fn test_provision_rejects_out_of_range_scope() {
        let db = StaticProfileDb::new(2);
        let err = db.provision(testuser1()).unwrap_err();
        assert_eq!(
            err,
            ProfileError::InvalidScope {
                scope: DeviceScope(3),
                max: 2
            }
        );
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn test_withdraw() {
        let db = StaticProfileDb::from_records(10, [testuser1()]).unwrap();
        let handle = db.clone();

        assert!(handle.withdraw(DeviceScope(3), "testuser1"));
        assert!(!handle.withdraw(DeviceScope(3), "testuser1"));
        assert_eq!(db.len(), 0);
        assert!(db.lookup_profile(DeviceScope(3), "testuser1").await.is_err());
    }
}
