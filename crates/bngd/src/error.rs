//! Error types for bngd
//!
//! Three classes of failure exist: fatal initialization errors (the kernel
//! route listing or the route subscription cannot be established), recoverable
//! lookup misses, and transient backend errors. Only the first class aborts
//! the daemon.

use crate::profile::ProfileError;
use thiserror::Error;

/// Errors that can occur in bngd
#[derive(Debug, Error)]
pub enum BngError {
    /// Netlink socket error
    #[error("Netlink error: {0}")]
    Netlink(String),

    /// Full route listing from the kernel failed
    #[error("Route listing failed: {0}")]
    RouteListing(String),

    /// Route change subscription could not be opened
    #[error("Route subscription failed: {0}")]
    Subscription(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile lookup error
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),
}

/// Result type alias for bngd operations
pub type Result<T> = std::result::Result<T, BngError>;
