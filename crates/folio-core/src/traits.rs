//! Core trait for storage access.

use async_trait::async_trait;

use crate::error::KeyValueStoreError;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;

/// Durable key-value store interface.
///
/// Implementations must be safe for concurrent use; callers treat every
/// operation as an atomic external call.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a single key. A missing key yields `Ok` with `kv: None`.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError>;

    /// Apply a write command.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError>;

    /// Scan keys sharing a prefix in lexicographic order.
    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError>;
}
