//! Error taxonomy for the cleanup core.
//!
//! Cleanup is a background hygiene task and its contract is "never make the
//! table worse": per-file failures are counted and skipped, configuration
//! conflicts end the run as a non-error skip, and only two conditions reach
//! the caller as errors: an unreachable object store, and misuse of the
//! crate's own API.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = CleanupError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CleanupError {
    /// The object store could not serve a listing, read, or write that the
    /// run cannot proceed without.
    #[error("object store unavailable: {source}")]
    StorageUnavailable {
        #[from]
        source: object_store::Error,
    },

    /// A caller-side invariant was violated (e.g. asking for the version of
    /// a path that does not carry one). Not expected at runtime.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CleanupError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        CleanupError::Internal(message.into())
    }
}
