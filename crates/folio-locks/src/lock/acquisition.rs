//! Lock acquisition logic.

use folio_core::KeyValueStore;
use folio_core::KeyValueStoreError;
use folio_core::WriteRequest;
use snafu::ResultExt;
use tracing::debug;

use super::CasResult;
use super::ResourceLockManager;
use super::types::AcquireOutcome;
use super::types::LockKind;
use super::types::LockState;
use super::types::lock_key;
use crate::error::CodecSnafu;
use crate::error::Result;

impl<S: KeyValueStore + ?Sized + 'static> ResourceLockManager<S> {
    /// Attempt to take a lock on `resource` for `holder_id`.
    ///
    /// A single non-blocking attempt: returns [`AcquireOutcome::Held`] with
    /// the conflicting holder when the resource is already locked by someone
    /// else. Re-acquisition by the current holder refreshes the TTL, and an
    /// expired entry is overwritten as if absent.
    pub async fn try_acquire(
        &self,
        resource: &str,
        holder_id: &str,
        kind: LockKind,
        ttl_ms: u64,
    ) -> Result<AcquireOutcome> {
        // Tiger Style: argument validation
        debug_assert!(!resource.is_empty(), "LOCK: resource must not be empty");
        debug_assert!(!holder_id.is_empty(), "LOCK: holder_id must not be empty");
        debug_assert!(ttl_ms > 0, "LOCK: ttl_ms must be positive");

        let key = lock_key(resource);

        loop {
            match self.read_state(resource, &key).await? {
                None => {
                    match self.try_acquire_create(&key, resource, holder_id, kind, ttl_ms).await? {
                        CasResult::Success(deadline_ms) => {
                            return Ok(AcquireOutcome::Acquired { deadline_ms });
                        }
                        CasResult::Retry => continue,
                    }
                }
                Some(current) => {
                    if !current.is_expired() && current.holder_id != holder_id {
                        return Ok(AcquireOutcome::Held {
                            holder_id: current.holder_id,
                            kind: current.kind,
                        });
                    }

                    // Expired entry or re-acquisition by the current holder.
                    match self
                        .try_acquire_replace(&key, &current, resource, holder_id, kind, ttl_ms)
                        .await?
                    {
                        CasResult::Success(deadline_ms) => {
                            return Ok(AcquireOutcome::Acquired { deadline_ms });
                        }
                        CasResult::Retry => continue,
                    }
                }
            }
        }
    }

    /// Create a new lock entry where none exists.
    async fn try_acquire_create(
        &self,
        key: &str,
        resource: &str,
        holder_id: &str,
        kind: LockKind,
        ttl_ms: u64,
    ) -> Result<CasResult<u64>> {
        let state = LockState::new(resource, holder_id, kind, ttl_ms);
        let new_json = serde_json::to_string(&state).context(CodecSnafu { resource })?;

        match self.cas_write(key, None, new_json).await? {
            CasResult::Success(()) => {
                debug!(resource, holder_id, kind = kind.as_str(), "resource lock acquired");
                Ok(CasResult::Success(state.deadline_ms))
            }
            CasResult::Retry => Ok(CasResult::Retry),
        }
    }

    /// Replace an expired entry or refresh the current holder's lock.
    async fn try_acquire_replace(
        &self,
        key: &str,
        current: &LockState,
        resource: &str,
        holder_id: &str,
        kind: LockKind,
        ttl_ms: u64,
    ) -> Result<CasResult<u64>> {
        let next = LockState::new(resource, holder_id, kind, ttl_ms);
        let old_json = serde_json::to_string(current).context(CodecSnafu { resource })?;
        let new_json = serde_json::to_string(&next).context(CodecSnafu { resource })?;

        match self.cas_write(key, Some(old_json), new_json).await? {
            CasResult::Success(()) => {
                debug!(resource, holder_id, kind = kind.as_str(), "resource lock replaced");
                Ok(CasResult::Success(next.deadline_ms))
            }
            CasResult::Retry => Ok(CasResult::Retry),
        }
    }

    /// Common CAS write helper that surfaces conflicts as retries.
    pub(crate) async fn cas_write(
        &self,
        key: &str,
        expected: Option<String>,
        new_value: String,
    ) -> Result<CasResult<()>> {
        match self
            .store
            .write(WriteRequest::compare_and_swap(key, expected, new_value))
            .await
        {
            Ok(_) => Ok(CasResult::Success(())),
            Err(KeyValueStoreError::CompareAndSwapFailed { .. }) => Ok(CasResult::Retry),
            Err(e) => Err(e.into()),
        }
    }
}
