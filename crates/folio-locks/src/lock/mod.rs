//! Resource lock manager.
//!
//! One lock per resource, replaced atomically through compare-and-swap on
//! the backing store. Expired entries are treated as absent on inspection
//! and overwritten on the next acquisition.

mod acquisition;
mod release;
pub mod types;

use std::sync::Arc;

use folio_core::KeyValueStore;
use folio_core::ReadRequest;
use snafu::ResultExt;

use self::types::LockState;
use self::types::lock_key;
use crate::error::CodecSnafu;
use crate::error::Result;

/// Result of a CAS operation on lock state.
pub(crate) enum CasResult<T> {
    /// CAS succeeded with the given result.
    Success(T),
    /// CAS failed due to concurrent modification, retry needed.
    Retry,
}

/// Manager for per-resource lock operations.
pub struct ResourceLockManager<S: KeyValueStore + ?Sized> {
    pub(crate) store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized + 'static> ResourceLockManager<S> {
    /// Create a new lock manager on top of `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Current lock on `resource`, if a live one exists.
    ///
    /// Expired entries are reported as `None`; they are physically removed
    /// by the next acquisition or release touching the resource.
    pub async fn status(&self, resource: &str) -> Result<Option<LockState>> {
        debug_assert!(!resource.is_empty(), "LOCK: resource must not be empty for status");

        let key = lock_key(resource);
        match self.read_state(resource, &key).await? {
            Some(state) if !state.is_expired() => Ok(Some(state)),
            _ => Ok(None),
        }
    }

    /// Read lock state from the store.
    pub(crate) async fn read_state(&self, resource: &str, key: &str) -> Result<Option<LockState>> {
        let result = self.store.read(ReadRequest::new(key)).await?;
        match result.kv {
            Some(entry) => {
                let state =
                    serde_json::from_str(&entry.value).context(CodecSnafu { resource })?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use folio_core::test_support::DeterministicKeyValueStore;

    use super::types::AcquireOutcome;
    use super::types::LockKind;
    use super::*;
    use crate::error::LockError;

    #[tokio::test]
    async fn publish_lock_blocks_edit_lock() {
        let store = DeterministicKeyValueStore::new();
        let manager = ResourceLockManager::new(store);

        let outcome = manager
            .try_acquire("/site/index.html", "job-1", LockKind::Publish, 60_000)
            .await
            .unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired { .. }));

        let outcome = manager
            .try_acquire("/site/index.html", "session-1", LockKind::Edit, 60_000)
            .await
            .unwrap();
        match outcome {
            AcquireOutcome::Held { holder_id, kind } => {
                assert_eq!(holder_id, "job-1");
                assert_eq!(kind, LockKind::Publish);
            }
            other => panic!("expected Held, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reacquisition_by_holder_refreshes() {
        let store = DeterministicKeyValueStore::new();
        let manager = ResourceLockManager::new(store);

        manager
            .try_acquire("/a", "job-1", LockKind::Publish, 60_000)
            .await
            .unwrap();
        let outcome = manager
            .try_acquire("/a", "job-1", LockKind::Publish, 120_000)
            .await
            .unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired { .. }));

        let state = manager.status("/a").await.unwrap().unwrap();
        assert_eq!(state.holder_id, "job-1");
    }

    #[tokio::test]
    async fn release_requires_holder() {
        let store = DeterministicKeyValueStore::new();
        let manager = ResourceLockManager::new(store);

        manager
            .try_acquire("/a", "job-1", LockKind::Publish, 60_000)
            .await
            .unwrap();

        let err = manager.release("/a", "job-2").await.unwrap_err();
        assert!(matches!(err, LockError::NotHolder { .. }));

        assert!(manager.release("/a", "job-1").await.unwrap());
        assert!(manager.status("/a").await.unwrap().is_none());

        // Releasing an absent lock is a no-op.
        assert!(!manager.release("/a", "job-1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_is_reported_absent_and_reclaimable() {
        let store = DeterministicKeyValueStore::new();
        let manager = ResourceLockManager::new(store);

        manager
            .try_acquire("/a", "job-1", LockKind::Publish, 1)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert!(manager.status("/a").await.unwrap().is_none());

        let outcome = manager
            .try_acquire("/a", "job-2", LockKind::Edit, 60_000)
            .await
            .unwrap();
        assert!(matches!(outcome, AcquireOutcome::Acquired { .. }));
        let state = manager.status("/a").await.unwrap().unwrap();
        assert_eq!(state.holder_id, "job-2");
    }
}
