//! Typed per-resource locks for the folio content repository.
//!
//! A resource carries at most one lock at a time. *Edit* locks are taken by
//! interactive sessions working on a resource; *publish* locks are taken by
//! the publish engine for every resource of a queued job and block edits
//! until the job leaves the pipeline. Lock state is stored as JSON in the
//! key-value store and updated through compare-and-swap, so concurrent
//! acquirers race safely. Every lock carries a TTL deadline: locks left
//! behind by a crashed process expire instead of wedging the repository.

#![warn(missing_docs)]

mod error;
mod lock;

pub use error::LockError;
pub use error::Result;
pub use lock::ResourceLockManager;
pub use lock::types::AcquireOutcome;
pub use lock::types::LockKind;
pub use lock::types::LockState;
