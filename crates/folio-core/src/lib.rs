//! Storage contract shared by the folio crates.
//!
//! The publish engine and the lock service both persist their state through
//! the [`KeyValueStore`] trait defined here: a small command set over string
//! keys and values with compare-and-swap support. Production deployments back
//! it with the repository database; tests use the deterministic in-memory
//! implementation from [`test_support`].

mod error;
mod kv;
mod traits;
pub mod test_support;

pub use error::KeyValueStoreError;
pub use kv::KeyValueEntry;
pub use kv::MAX_KEY_SIZE;
pub use kv::MAX_SCAN_RESULTS;
pub use kv::MAX_VALUE_SIZE;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::ScanRequest;
pub use kv::ScanResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use traits::KeyValueStore;
