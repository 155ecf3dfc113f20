//! Profile lookup errors.

use super::types::{DeviceScope, ProfileKey};
use thiserror::Error;

/// Failure reported by the AAA backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AaaError {
    /// The backend rejected the profile
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// The backend has no such profile
    #[error("not found")]
    NotFound,

    /// The backend could not be reached or answered garbage
    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure returned by [`ProfileCache::get`](super::ProfileCache::get).
///
/// None of these are cached; the same request queries the backend again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("device scope {scope} out of range (configured scopes: {max})")]
    InvalidScope { scope: DeviceScope, max: usize },

    #[error("profile {key} not found")]
    NotFound { key: ProfileKey },

    #[error("profile {key} not authorized: {reason}")]
    NotAuthorized { key: ProfileKey, reason: String },

    #[error("AAA backend unavailable for {key}: {reason}")]
    Backend { key: ProfileKey, reason: String },
}

impl ProfileError {
    pub(crate) fn from_aaa(key: ProfileKey, err: AaaError) -> Self {
        match err {
            AaaError::NotAuthorized(reason) => Self::NotAuthorized { key, reason },
            AaaError::NotFound => Self::NotFound { key },
            AaaError::Transport(reason) => Self::Backend { key, reason },
        }
    }

    /// True when the backend answered that the profile does not resolve.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::NotAuthorized { .. })
    }

    /// True when a later retry may succeed without any provisioning change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}
