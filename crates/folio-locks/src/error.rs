//! Error types for lock operations.

use folio_core::KeyValueStoreError;
use snafu::Snafu;

/// Result type for lock operations.
pub type Result<T, E = LockError> = std::result::Result<T, E>;

/// Errors that can occur in the lock service.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum LockError {
    /// Persisted lock state could not be encoded or decoded.
    #[snafu(display("lock state for {resource} could not be encoded or decoded: {source}"))]
    Codec {
        /// Resource whose lock state failed.
        resource: String,
        /// Source error.
        source: serde_json::Error,
    },

    /// The underlying store failed.
    #[snafu(display("lock storage error: {source}"))]
    Storage {
        /// Source error.
        source: KeyValueStoreError,
    },

    /// A release was attempted by a principal that does not hold the lock.
    #[snafu(display("lock on {resource} is held by {holder}, not {requester}"))]
    NotHolder {
        /// Resource whose lock was targeted.
        resource: String,
        /// Current holder of the lock.
        holder: String,
        /// Principal that attempted the release.
        requester: String,
    },
}

impl From<KeyValueStoreError> for LockError {
    fn from(err: KeyValueStoreError) -> Self {
        Self::Storage { source: err }
    }
}
