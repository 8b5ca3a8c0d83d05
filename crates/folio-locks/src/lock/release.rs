//! Lock release logic.

use folio_core::KeyValueStore;
use folio_core::KeyValueStoreError;
use folio_core::WriteRequest;
use snafu::ResultExt;
use tracing::debug;

use super::ResourceLockManager;
use super::types::lock_key;
use crate::error::CodecSnafu;
use crate::error::LockError;
use crate::error::Result;

impl<S: KeyValueStore + ?Sized + 'static> ResourceLockManager<S> {
    /// Release the lock held on `resource` by `holder_id`.
    ///
    /// Returns true when a live lock was removed. Releasing an absent or
    /// expired lock is a no-op returning false; releasing a live lock held
    /// by someone else fails with [`LockError::NotHolder`].
    pub async fn release(&self, resource: &str, holder_id: &str) -> Result<bool> {
        // Tiger Style: argument validation
        debug_assert!(!resource.is_empty(), "LOCK: resource must not be empty for release");
        debug_assert!(!holder_id.is_empty(), "LOCK: holder_id must not be empty for release");

        let key = lock_key(resource);

        loop {
            let Some(state) = self.read_state(resource, &key).await? else {
                return Ok(false);
            };

            let expired = state.is_expired();
            if !expired && state.holder_id != holder_id {
                return Err(LockError::NotHolder {
                    resource: resource.to_string(),
                    holder: state.holder_id,
                    requester: holder_id.to_string(),
                });
            }

            let expected = serde_json::to_string(&state).context(CodecSnafu { resource })?;
            match self
                .store
                .write(WriteRequest::compare_and_delete(&key, expected))
                .await
            {
                Ok(_) => {
                    if !expired {
                        debug!(resource, holder_id, "resource lock released");
                    }
                    return Ok(!expired);
                }
                Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
