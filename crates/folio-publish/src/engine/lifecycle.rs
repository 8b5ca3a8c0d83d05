//! Job lifecycle operations: publish, abort, pause/resume, re-initialize.

use std::sync::Arc;

use folio_core::KeyValueStore;
use folio_core::ReadRequest;
use folio_locks::AcquireOutcome;
use folio_locks::LockKind;
use tracing::info;
use tracing::warn;

use super::PublishEngine;
use super::storage::HISTORY_INDEX_KEY;
use super::storage::QUEUE_INDEX_KEY;
use crate::error::PublishError;
use crate::error::Result;
use crate::events::ListenerId;
use crate::events::PublishEvent;
use crate::events::PublishListener;
use crate::job::JobId;
use crate::job::JobStatus;
use crate::job::PublishJob;
use crate::queue::PublishHistory;
use crate::queue::PublishQueue;
use crate::report;
use crate::types::Principal;
use crate::types::ProjectId;
use crate::types::ResourcePath;
use crate::types::normalize_resource_set;

impl<S: KeyValueStore + ?Sized + 'static> PublishEngine<S> {
    /// Enqueue a publish job for an explicit resource set.
    ///
    /// Duplicates and overlaps in `resources` are collapsed, then a publish
    /// lock is taken on every remaining resource — all or nothing: on the
    /// first conflict the locks already taken are rolled back and the call
    /// fails with [`PublishError::LockConflict`], leaving no partial state.
    /// The created job enters the queue, the *enqueue* event fires, and the
    /// job id is returned.
    pub async fn publish(
        &self,
        resources: Vec<ResourcePath>,
        user: &Principal,
        project: &ProjectId,
    ) -> Result<JobId> {
        // Tiger Style: a publish request must name its principal
        assert!(!user.id.is_empty(), "user id must not be empty for publish");

        {
            let state = self.shared().state.lock().await;
            if !state.enabled && !user.admin {
                return Err(PublishError::EngineDisabled { user: user.id.clone() });
            }
        }

        let resources = normalize_resource_set(resources);
        if resources.is_empty() {
            return Err(PublishError::NothingToPublish {
                project: project.to_string(),
            });
        }

        // All-or-nothing lock acquisition; the job id is the lock holder.
        let id = JobId::generate();
        let mut acquired: Vec<ResourcePath> = Vec::with_capacity(resources.len());
        for resource in &resources {
            let outcome = match self
                .shared()
                .locks
                .try_acquire(
                    resource.as_str(),
                    id.as_str(),
                    LockKind::Publish,
                    self.shared().config.lock_ttl_ms,
                )
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.shared().release_locks(&id, &acquired).await;
                    return Err(e.into());
                }
            };
            match outcome {
                AcquireOutcome::Acquired { .. } => acquired.push(resource.clone()),
                AcquireOutcome::Held { holder_id, kind } => {
                    self.shared().release_locks(&id, &acquired).await;
                    warn!(
                        resource = %resource,
                        holder = %holder_id,
                        kind = kind.as_str(),
                        "publish rejected by conflicting lock"
                    );
                    return Err(PublishError::LockConflict {
                        resource: resource.to_string(),
                        holder: holder_id,
                    });
                }
            }
        }

        let job = PublishJob::new(id, user.clone(), project.clone(), resources);
        let job_id = job.id.clone();

        let mut state = self.shared().state.lock().await;
        if !state.enabled && !user.admin {
            // Disabled while we were acquiring locks.
            drop(state);
            self.shared().release_locks(&job.id, &job.resources).await;
            return Err(PublishError::EngineDisabled { user: user.id.clone() });
        }
        if let Err(e) = self.shared().store_job(&job).await {
            drop(state);
            self.shared().release_locks(&job.id, &job.resources).await;
            return Err(e);
        }
        state.queue.push(job.clone());
        self.shared().persist_queue_index(&state).await;
        self.shared().bus.emit(PublishEvent::Enqueued(job));
        self.shared().refresh_idle(&state);
        drop(state);
        self.shared().wake.notify_one();

        info!(job_id = %job_id, user = %user.id, project = %project, "publish job enqueued");
        Ok(job_id)
    }

    /// Enqueue a publish job covering all changed resources of `project`.
    pub async fn publish_project(&self, project: &ProjectId, user: &Principal) -> Result<JobId> {
        let resources = self
            .shared()
            .resolver
            .changed_resources(project)
            .await
            .map_err(|e| PublishError::ResolveFailed {
                project: project.to_string(),
                reason: e.to_string(),
            })?;
        self.publish(resources, user, project).await
    }

    /// Abort a job that is still enqueued.
    ///
    /// Only the job owner or an administrator may abort. A running job
    /// cannot be aborted and fails with [`PublishError::InvalidJobState`];
    /// a job already finished or aborted fails with
    /// [`PublishError::AlreadyTerminal`]. On success the job leaves the
    /// queue as `Aborted`, its locks are released when `release_locks` is
    /// set, and the *abort* event fires, followed by *remove* for a history
    /// entry evicted by the append.
    pub async fn abort(&self, id: &JobId, requester: &Principal, release_locks: bool) -> Result<()> {
        let mut state = self.shared().state.lock().await;

        if state.running.as_ref().is_some_and(|job| job.id == *id) {
            return Err(PublishError::InvalidJobState {
                id: id.to_string(),
                state: JobStatus::Running,
                operation: "abort".to_string(),
            });
        }
        if let Some(done) = state.history.find(id) {
            return Err(PublishError::AlreadyTerminal {
                id: id.to_string(),
                state: done.status,
            });
        }
        let permitted = match state.queue.get(id) {
            None => {
                return Err(PublishError::JobNotFound { id: id.to_string() });
            }
            Some(job) => job.user.id == requester.id || requester.admin,
        };
        if !permitted {
            return Err(PublishError::NotPermitted {
                user: requester.id.clone(),
                job_id: id.to_string(),
            });
        }
        let Some(mut job) = state.queue.remove(id) else {
            return Err(PublishError::JobNotFound { id: id.to_string() });
        };

        job.mark_aborted();
        if release_locks {
            self.shared().release_locks(&job.id, &job.resources).await;
        }

        let evicted = state.history.push(job.clone());
        self.shared().persist_job(&job).await;
        self.shared().persist_queue_index(&state).await;
        self.shared().persist_history_index(&state).await;
        if let Some(old) = &evicted {
            self.shared().remove_job_record(&old.id).await;
        }
        self.shared().bus.emit(PublishEvent::Aborted(job));
        if let Some(old) = evicted {
            self.shared().bus.emit(PublishEvent::Removed(old));
        }
        self.shared().refresh_idle(&state);

        info!(job_id = %id, requester = %requester.id, release_locks, "queued publish job aborted");
        Ok(())
    }

    /// Resume the worker loop after [`Self::stop_publishing`].
    pub async fn start_publishing(&self) {
        let mut state = self.shared().state.lock().await;
        state.paused = false;
        self.shared().refresh_idle(&state);
        drop(state);
        self.shared().wake.notify_one();
        info!("publish worker resumed");
    }

    /// Suspend the worker loop: an in-flight job finishes, but no further
    /// job is dequeued until [`Self::start_publishing`].
    pub async fn stop_publishing(&self) {
        let mut state = self.shared().state.lock().await;
        state.paused = true;
        self.shared().refresh_idle(&state);
        info!("publish worker paused");
    }

    /// Allow non-administrators to publish again after [`Self::disable`].
    pub async fn enable(&self) {
        let mut state = self.shared().state.lock().await;
        state.enabled = true;
        info!("publish engine enabled");
    }

    /// Administratively disable the engine: publish calls from
    /// non-administrators fail with [`PublishError::EngineDisabled`] until
    /// [`Self::enable`]. Administrators may still publish.
    pub async fn disable(&self) {
        let mut state = self.shared().state.lock().await;
        state.enabled = false;
        info!("publish engine disabled");
    }

    /// Register an observer for lifecycle events.
    pub fn add_publish_listener(&self, listener: Arc<dyn PublishListener>) -> ListenerId {
        self.shared().bus.add(listener)
    }

    /// Unregister an observer. Returns false when the id is unknown.
    pub fn remove_publish_listener(&self, id: ListenerId) -> bool {
        self.shared().bus.remove(id)
    }

    /// Sealed report of a terminal job.
    ///
    /// Fails with [`PublishError::InvalidJobState`] while the job is still
    /// running and [`PublishError::ReportNotFound`] when no report exists
    /// (the job never started, or the report aged out of the store).
    pub async fn report_contents(&self, id: &JobId) -> Result<Vec<u8>> {
        {
            let state = self.shared().state.lock().await;
            if state.running.as_ref().is_some_and(|job| job.id == *id) {
                return Err(PublishError::InvalidJobState {
                    id: id.to_string(),
                    state: JobStatus::Running,
                    operation: "read report".to_string(),
                });
            }
        }

        let result = self
            .shared()
            .store
            .read(ReadRequest::new(report::report_key(id)))
            .await?;
        match result.kv {
            Some(entry) => Ok(entry.value.into_bytes()),
            None => Err(PublishError::ReportNotFound { id: id.to_string() }),
        }
    }

    /// Discard in-memory state and reload queue and history from the
    /// durable store.
    ///
    /// Safe to call at any time, including while a job is running: the
    /// interrupted job cannot be resumed, so it is recorded as `Aborted` in
    /// the reloaded history, its locks are released and its report sealed.
    /// The call is serialized against the worker and all other operations
    /// by the engine mutex, and calling it twice without intervening
    /// mutations yields identical snapshots.
    pub async fn initialize(&self) -> Result<()> {
        let shared = self.shared();
        let mut state = shared.state.lock().await;
        state.epoch += 1;

        // An in-flight execution (if any) now belongs to a stale epoch; its
        // results will be discarded by the worker.
        let mut interrupted: Vec<PublishJob> = state.running.take().into_iter().collect();

        let queue_ids = shared.load_index(QUEUE_INDEX_KEY).await?;
        let history_ids = shared.load_index(HISTORY_INDEX_KEY).await?;
        let marker = shared.load_running_marker().await?;

        // A running marker without a matching in-memory job means a previous
        // process died mid-publish; recover that job as interrupted too.
        if let Some(marker_id) = marker {
            let already_known = interrupted.iter().any(|job| job.id == marker_id);
            if !already_known {
                match shared.load_job(&marker_id).await? {
                    Some(job) if job.status == JobStatus::Running => interrupted.push(job),
                    _ => {}
                }
            }
        }

        let mut queue = PublishQueue::new();
        for id in queue_ids {
            match shared.load_job(&id).await? {
                Some(job) if job.status == JobStatus::Enqueued => queue.push(job),
                Some(job) => {
                    warn!(
                        job_id = %id,
                        status = job.status.as_str(),
                        "skipping non-enqueued job in persisted queue"
                    );
                }
                None => warn!(job_id = %id, "queued job record missing from store, skipping"),
            }
        }

        let mut history = PublishHistory::new(shared.config.history_size);
        let mut removed: Vec<PublishJob> = Vec::new();
        for id in history_ids {
            match shared.load_job(&id).await? {
                Some(job) if job.status.is_terminal() => {
                    if let Some(evicted) = history.push(job) {
                        removed.push(evicted);
                    }
                }
                Some(job) => {
                    warn!(
                        job_id = %id,
                        status = job.status.as_str(),
                        "skipping non-terminal job in persisted history"
                    );
                }
                None => warn!(job_id = %id, "history job record missing from store, skipping"),
            }
        }

        let mut aborted: Vec<PublishJob> = Vec::new();
        for mut job in interrupted {
            warn!(job_id = %job.id, "publish job was running during re-initialization, recording as aborted");
            job.mark_aborted();
            shared.release_locks(&job.id, &job.resources).await;
            report::seal_interrupted(&shared.store, &job.id).await;
            if let Some(evicted) = history.push(job.clone()) {
                removed.push(evicted);
            }
            aborted.push(job);
        }

        state.queue = queue;
        state.history = history;
        state.running = None;

        for job in &aborted {
            shared.persist_job(job).await;
        }
        shared.persist_queue_index(&state).await;
        shared.persist_history_index(&state).await;
        shared.persist_running_marker(None).await;
        for old in &removed {
            shared.remove_job_record(&old.id).await;
        }

        for job in aborted {
            shared.bus.emit(PublishEvent::Aborted(job));
        }
        for old in removed {
            shared.bus.emit(PublishEvent::Removed(old));
        }
        shared.refresh_idle(&state);
        let queued = state.queue.len();
        let retained = state.history.len();
        drop(state);
        shared.wake.notify_one();

        info!(queued, retained, "publish engine re-initialized from store");
        Ok(())
    }
}
