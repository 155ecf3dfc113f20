//! AAA backend contract.

use super::error::AaaError;
use super::types::{DeviceScope, SlaProfileRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Remote authorization backend consulted on a cache miss.
///
/// The wire exchange (e.g. RADIUS Access-Request) lives behind this trait.
/// Implementations own their timeout and retry policy; the caches never
/// retry and never cache an error.
#[async_trait]
pub trait AaaBackend: Send + Sync {
    /// Looks up the policy record for `profile` in `scope`.
    async fn lookup_profile(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<SlaProfileRecord, AaaError>;
}

#[async_trait]
impl<B: AaaBackend + ?Sized> AaaBackend for Arc<B> {
    async fn lookup_profile(
        &self,
        scope: DeviceScope,
        profile: &str,
    ) -> Result<SlaProfileRecord, AaaError> {
        (**self).lookup_profile(scope, profile).await
    }
}
