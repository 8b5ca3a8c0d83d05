//! Deterministic in-memory store for tests.
//!
//! Thread-safe, supports all store operations with predictable behavior.
//! Production deployments back [`crate::KeyValueStore`] with the repository
//! database instead.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::KeyValueStoreError;
use crate::kv::KeyValueEntry;
use crate::kv::MAX_KEY_SIZE;
use crate::kv::MAX_SCAN_RESULTS;
use crate::kv::MAX_VALUE_SIZE;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::ScanRequest;
use crate::kv::ScanResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::traits::KeyValueStore;

/// Versioned value for tracking writes to a key.
#[derive(Clone)]
struct VersionedValue {
    value: String,
    version: u64,
}

/// A deterministic in-memory key-value store for testing.
pub struct DeterministicKeyValueStore {
    data: RwLock<BTreeMap<String, VersionedValue>>,
}

impl Default for DeterministicKeyValueStore {
    fn default() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }
}

impl DeterministicKeyValueStore {
    /// Create a new deterministic store wrapped in `Arc`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn validate(key: &str, value: Option<&str>) -> Result<(), KeyValueStoreError> {
    if key.is_empty() {
        return Err(KeyValueStoreError::InvalidKey {
            reason: "key must not be empty".to_string(),
        });
    }
    if key.len() > MAX_KEY_SIZE {
        return Err(KeyValueStoreError::InvalidKey {
            reason: format!("key exceeds {MAX_KEY_SIZE} bytes"),
        });
    }
    if let Some(value) = value
        && value.len() > MAX_VALUE_SIZE
    {
        return Err(KeyValueStoreError::ValueTooLarge {
            size: value.len(),
            max: MAX_VALUE_SIZE,
        });
    }
    Ok(())
}

#[async_trait]
impl KeyValueStore for DeterministicKeyValueStore {
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let data = self.data.read().await;
        Ok(ReadResult {
            kv: data.get(&request.key).map(|versioned| KeyValueEntry {
                key: request.key.clone(),
                value: versioned.value.clone(),
                version: versioned.version,
            }),
        })
    }

    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        let mut data = self.data.write().await;
        match request.command {
            WriteCommand::Set { key, value } => {
                validate(&key, Some(&value))?;
                let version = data.get(&key).map(|v| v.version + 1).unwrap_or(1);
                data.insert(key, VersionedValue { value, version });
                Ok(WriteResult { version })
            }
            WriteCommand::Delete { key } => {
                validate(&key, None)?;
                data.remove(&key);
                Ok(WriteResult { version: 0 })
            }
            WriteCommand::CompareAndSwap {
                key,
                expected,
                new_value,
            } => {
                validate(&key, Some(&new_value))?;
                let current = data.get(&key).map(|v| v.value.clone());
                if current != expected {
                    return Err(KeyValueStoreError::CompareAndSwapFailed { key });
                }
                let version = data.get(&key).map(|v| v.version + 1).unwrap_or(1);
                data.insert(
                    key,
                    VersionedValue {
                        value: new_value,
                        version,
                    },
                );
                Ok(WriteResult { version })
            }
            WriteCommand::CompareAndDelete { key, expected } => {
                validate(&key, None)?;
                match data.get(&key) {
                    Some(current) if current.value == expected => {
                        data.remove(&key);
                        Ok(WriteResult { version: 0 })
                    }
                    _ => Err(KeyValueStoreError::CompareAndSwapFailed { key }),
                }
            }
        }
    }

    async fn scan(&self, request: ScanRequest) -> Result<ScanResult, KeyValueStoreError> {
        let limit = request.limit.unwrap_or(MAX_SCAN_RESULTS).min(MAX_SCAN_RESULTS) as usize;
        let data = self.data.read().await;
        let mut entries = Vec::new();
        let mut is_truncated = false;
        for (key, versioned) in data.range(request.prefix.clone()..) {
            if !key.starts_with(&request.prefix) {
                break;
            }
            if entries.len() == limit {
                is_truncated = true;
                break;
            }
            entries.push(KeyValueEntry {
                key: key.clone(),
                value: versioned.value.clone(),
                version: versioned.version,
            });
        }
        Ok(ScanResult {
            entries,
            is_truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_and_read_roundtrip() {
        let store = DeterministicKeyValueStore::new();

        store.write(WriteRequest::set("a", "1")).await.unwrap();
        let result = store.read(ReadRequest::new("a")).await.unwrap();
        let kv = result.kv.unwrap();
        assert_eq!(kv.value, "1");
        assert_eq!(kv.version, 1);

        store.write(WriteRequest::set("a", "2")).await.unwrap();
        let result = store.read(ReadRequest::new("a")).await.unwrap();
        assert_eq!(result.kv.unwrap().version, 2);
    }

    #[tokio::test]
    async fn read_missing_key_is_none() {
        let store = DeterministicKeyValueStore::new();
        let result = store.read(ReadRequest::new("missing")).await.unwrap();
        assert!(result.kv.is_none());
    }

    #[tokio::test]
    async fn compare_and_swap_enforces_expectation() {
        let store = DeterministicKeyValueStore::new();

        // Create-if-absent succeeds once.
        store
            .write(WriteRequest::compare_and_swap("k", None, "v1"))
            .await
            .unwrap();
        let err = store
            .write(WriteRequest::compare_and_swap("k", None, "v2"))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyValueStoreError::CompareAndSwapFailed { .. }));

        // Swap with the right expectation succeeds.
        store
            .write(WriteRequest::compare_and_swap("k", Some("v1".to_string()), "v2"))
            .await
            .unwrap();
        let result = store.read(ReadRequest::new("k")).await.unwrap();
        assert_eq!(result.kv.unwrap().value, "v2");
    }

    #[tokio::test]
    async fn compare_and_delete_removes_matching_value() {
        let store = DeterministicKeyValueStore::new();
        store.write(WriteRequest::set("k", "v")).await.unwrap();

        let err = store
            .write(WriteRequest::compare_and_delete("k", "other"))
            .await
            .unwrap_err();
        assert!(matches!(err, KeyValueStoreError::CompareAndSwapFailed { .. }));

        store
            .write(WriteRequest::compare_and_delete("k", "v"))
            .await
            .unwrap();
        assert!(store.read(ReadRequest::new("k")).await.unwrap().kv.is_none());
    }

    #[tokio::test]
    async fn scan_honors_prefix_and_limit() {
        let store = DeterministicKeyValueStore::new();
        for i in 0..5 {
            store
                .write(WriteRequest::set(format!("p:{i}"), format!("{i}")))
                .await
                .unwrap();
        }
        store.write(WriteRequest::set("q:0", "x")).await.unwrap();

        let result = store
            .scan(ScanRequest {
                prefix: "p:".to_string(),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(result.entries.len(), 5);
        assert!(!result.is_truncated);

        let result = store
            .scan(ScanRequest {
                prefix: "p:".to_string(),
                limit: Some(3),
            })
            .await
            .unwrap();
        assert_eq!(result.entries.len(), 3);
        assert!(result.is_truncated);
    }

    #[tokio::test]
    async fn empty_key_is_rejected() {
        let store = DeterministicKeyValueStore::new();
        let err = store.write(WriteRequest::set("", "v")).await.unwrap_err();
        assert!(matches!(err, KeyValueStoreError::InvalidKey { .. }));
    }
}
