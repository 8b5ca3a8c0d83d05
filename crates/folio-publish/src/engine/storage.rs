//! Persistence of engine state in the durable store.
//!
//! Layout (serde_json values):
//! - `__publish:job:{id}` — one record per live or retained job
//! - `__publish:queue` — array of queued job ids, FIFO order
//! - `__publish:history` — array of terminal job ids, completion order
//! - `__publish:running` — id of the running job, cleared on completion
//!
//! Transitions commit in memory first; persistence failures on the hot path
//! are logged rather than propagated (the next `initialize` reconciles from
//! whatever the store holds). Loads used by `initialize` do propagate, since
//! an unreachable store there must surface to the caller.

use folio_core::KeyValueStore;
use folio_core::ReadRequest;
use folio_core::WriteRequest;
use tracing::error;
use tracing::warn;

use super::EngineShared;
use super::EngineState;
use crate::error::Result;
use crate::job::JobId;
use crate::job::PublishJob;

pub(crate) const JOB_KEY_PREFIX: &str = "__publish:job:";
pub(crate) const QUEUE_INDEX_KEY: &str = "__publish:queue";
pub(crate) const HISTORY_INDEX_KEY: &str = "__publish:history";
pub(crate) const RUNNING_KEY: &str = "__publish:running";

/// Storage key of a job record.
pub(crate) fn job_key(id: &JobId) -> String {
    format!("{JOB_KEY_PREFIX}{id}")
}

impl<S: KeyValueStore + ?Sized + 'static> EngineShared<S> {
    /// Write a job record, propagating failures.
    pub(crate) async fn store_job(&self, job: &PublishJob) -> Result<()> {
        let value = serde_json::to_string(job)?;
        self.store.write(WriteRequest::set(job_key(&job.id), value)).await?;
        Ok(())
    }

    /// Write a job record, logging failures.
    pub(crate) async fn persist_job(&self, job: &PublishJob) {
        if let Err(e) = self.store_job(job).await {
            error!(job_id = %job.id, error = %e, "failed to persist job record");
        }
    }

    /// Delete a job record, logging failures.
    pub(crate) async fn remove_job_record(&self, id: &JobId) {
        if let Err(e) = self.store.write(WriteRequest::delete(job_key(id))).await {
            error!(job_id = %id, error = %e, "failed to delete job record");
        }
    }

    /// Load a job record. A missing key yields `None`; a corrupt record is
    /// logged and skipped as `None` too.
    pub(crate) async fn load_job(&self, id: &JobId) -> Result<Option<PublishJob>> {
        let result = self.store.read(ReadRequest::new(job_key(id))).await?;
        match result.kv {
            Some(entry) => match serde_json::from_str::<PublishJob>(&entry.value) {
                Ok(job) => Ok(Some(job)),
                Err(e) => {
                    warn!(job_id = %id, error = %e, "failed to deserialize persisted job, skipping");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Rewrite the queue index from `state`, logging failures.
    pub(crate) async fn persist_queue_index(&self, state: &EngineState) {
        let ids: Vec<&str> = state.queue.iter().map(|job| job.id.as_str()).collect();
        self.persist_index(QUEUE_INDEX_KEY, &ids).await;
    }

    /// Rewrite the history index from `state`, logging failures.
    pub(crate) async fn persist_history_index(&self, state: &EngineState) {
        let ids: Vec<&str> = state.history.iter().map(|job| job.id.as_str()).collect();
        self.persist_index(HISTORY_INDEX_KEY, &ids).await;
    }

    async fn persist_index(&self, key: &str, ids: &[&str]) {
        let value = match serde_json::to_string(ids) {
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %e, "failed to serialize job index");
                return;
            }
        };
        if let Err(e) = self.store.write(WriteRequest::set(key, value)).await {
            error!(key, error = %e, "failed to persist job index");
        }
    }

    /// Load an id index written by [`Self::persist_queue_index`] or
    /// [`Self::persist_history_index`].
    pub(crate) async fn load_index(&self, key: &str) -> Result<Vec<JobId>> {
        let result = self.store.read(ReadRequest::new(key)).await?;
        match result.kv {
            Some(entry) => {
                let ids: Vec<String> = serde_json::from_str(&entry.value)?;
                Ok(ids.into_iter().map(JobId::from_string).collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Set or clear the running-job marker, logging failures.
    pub(crate) async fn persist_running_marker(&self, id: Option<&JobId>) {
        let request = match id {
            Some(id) => WriteRequest::set(RUNNING_KEY, id.as_str()),
            None => WriteRequest::delete(RUNNING_KEY),
        };
        if let Err(e) = self.store.write(request).await {
            error!(error = %e, "failed to persist running-job marker");
        }
    }

    /// Load the running-job marker.
    pub(crate) async fn load_running_marker(&self) -> Result<Option<JobId>> {
        let result = self.store.read(ReadRequest::new(RUNNING_KEY)).await?;
        Ok(result.kv.map(|entry| JobId::from_string(entry.value)))
    }
}
