//! Error types for store operations.

use snafu::Snafu;

/// Errors returned by store implementations.
#[derive(Debug, Clone, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum KeyValueStoreError {
    /// The key does not exist.
    #[snafu(display("key not found: {key}"))]
    NotFound {
        /// Key that was not found.
        key: String,
    },

    /// A compare-and-swap or compare-and-delete expectation was not met.
    #[snafu(display("compare-and-swap failed for key: {key}"))]
    CompareAndSwapFailed {
        /// Key that had the conflict.
        key: String,
    },

    /// The key was rejected (empty or above the size limit).
    #[snafu(display("invalid key: {reason}"))]
    InvalidKey {
        /// Why the key was rejected.
        reason: String,
    },

    /// The value exceeds the size limit.
    #[snafu(display("value too large: {size} bytes (max: {max} bytes)"))]
    ValueTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The store is unreachable or failing.
    #[snafu(display("store unavailable: {reason}"))]
    Unavailable {
        /// Failure description.
        reason: String,
    },
}
