//! Publish job model and state machine.

use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::types::Principal;
use crate::types::ProjectId;
use crate::types::ResourcePath;

/// Unique identifier of a publish job, assigned at enqueue time and stable
/// for the job's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id.
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a publish job.
///
/// `Enqueued → Running → Finished` is the normal path. `Aborted` is reached
/// from `Enqueued` by an explicit abort, and — as the single exception —
/// from `Running` when the engine is re-initialized underneath an in-flight
/// job that cannot be resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Waiting in the queue, not yet started.
    Enqueued,
    /// Being executed by the worker.
    Running,
    /// Completed normally (terminal).
    Finished,
    /// Cancelled before execution, or orphaned by a re-initialization
    /// (terminal).
    Aborted,
}

impl JobStatus {
    /// True for `Finished` and `Aborted`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// Short name for logging and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enqueued => "enqueued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
        }
    }
}

/// One request to publish a fixed set of resources, tracked through the
/// job state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishJob {
    /// Unique id, assigned at enqueue time.
    pub id: JobId,
    /// Principal that requested the publish.
    pub user: Principal,
    /// Project the resources belong to.
    pub project: ProjectId,
    /// Resolved resource set; fixed at enqueue, never empty.
    pub resources: Vec<ResourcePath>,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// When the job entered the queue.
    pub enqueued_at: DateTime<Utc>,
    /// When the worker began executing the job. Unset while enqueued, and
    /// permanently unset for jobs aborted before they started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PublishJob {
    /// Create a job in the `Enqueued` state with a pre-generated id.
    pub(crate) fn new(
        id: JobId,
        user: Principal,
        project: ProjectId,
        resources: Vec<ResourcePath>,
    ) -> Self {
        // Tiger Style: a job must cover at least one resource
        debug_assert!(!resources.is_empty(), "publish job must cover at least one resource");

        Self {
            id,
            user,
            project,
            resources,
            status: JobStatus::Enqueued,
            enqueued_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Transition `Enqueued -> Running`.
    pub(crate) fn mark_started(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Enqueued, "only an enqueued job can start");

        self.status = JobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Transition `Running -> Finished`.
    pub(crate) fn mark_finished(&mut self) {
        debug_assert_eq!(self.status, JobStatus::Running, "only a running job can finish");

        self.status = JobStatus::Finished;
        self.finished_at = Some(Utc::now());
    }

    /// Transition into `Aborted` from any non-terminal state.
    pub(crate) fn mark_aborted(&mut self) {
        debug_assert!(!self.status.is_terminal(), "job is already terminal");

        self.status = JobStatus::Aborted;
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> PublishJob {
        PublishJob::new(
            JobId::generate(),
            Principal::new("editor"),
            ProjectId::new("site"),
            vec![ResourcePath::new("/a")],
        )
    }

    #[test]
    fn timestamps_populate_in_order() {
        let mut job = job();
        assert_eq!(job.status, JobStatus::Enqueued);
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_none());

        job.mark_started();
        assert_eq!(job.status, JobStatus::Running);
        let started = job.started_at.unwrap();
        assert!(started >= job.enqueued_at);

        job.mark_finished();
        assert_eq!(job.status, JobStatus::Finished);
        assert!(job.finished_at.unwrap() >= started);
    }

    #[test]
    fn abort_before_start_leaves_started_at_unset() {
        let mut job = job();
        job.mark_aborted();
        assert_eq!(job.status, JobStatus::Aborted);
        assert!(job.started_at.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn identity_is_the_id() {
        let a = job();
        let b = PublishJob {
            resources: vec![ResourcePath::new("/other")],
            ..a.clone()
        };
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn serde_roundtrip() {
        let job = job();
        let json = serde_json::to_string(&job).unwrap();
        let back: PublishJob = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, job.id);
        assert_eq!(back.status, job.status);
        assert_eq!(back.resources, job.resources);
    }
}
