//! Error types for the publish engine.

use folio_core::KeyValueStoreError;
use folio_locks::LockError;
use snafu::Snafu;

use crate::job::JobStatus;

/// Result type for publish operations.
pub type Result<T, E = PublishError> = std::result::Result<T, E>;

/// Errors surfaced by the publish engine.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PublishError {
    /// A target resource is already locked incompatibly. The publish call
    /// acquired nothing: locks taken before the conflict are rolled back.
    #[snafu(display("resource {resource} is locked by {holder}"))]
    LockConflict {
        /// Resource that could not be locked.
        resource: String,
        /// Holder of the conflicting lock.
        holder: String,
    },

    /// The caller owns neither the job nor administrator rights.
    #[snafu(display("user {user} may not modify job {job_id}"))]
    NotPermitted {
        /// User that made the call.
        user: String,
        /// Job the call targeted.
        job_id: String,
    },

    /// The job does not support the requested operation in its current state.
    #[snafu(display("job {id} is {}; cannot {operation}", state.as_str()))]
    InvalidJobState {
        /// Job the call targeted.
        id: String,
        /// Current job state.
        state: JobStatus,
        /// Operation that was attempted.
        operation: String,
    },

    /// Abort requested for a job that already reached a terminal state.
    #[snafu(display("job {id} is already terminal ({})", state.as_str()))]
    AlreadyTerminal {
        /// Job the call targeted.
        id: String,
        /// Terminal state the job is in.
        state: JobStatus,
    },

    /// The engine is administratively disabled and the caller is not an
    /// administrator.
    #[snafu(display("publish engine is disabled; user {user} rejected"))]
    EngineDisabled {
        /// User that made the call.
        user: String,
    },

    /// No job with this id is known to the engine.
    #[snafu(display("job not found: {id}"))]
    JobNotFound {
        /// Job id that was not found.
        id: String,
    },

    /// The resolved resource set is empty.
    #[snafu(display("nothing to publish in project {project}"))]
    NothingToPublish {
        /// Project the call targeted.
        project: String,
    },

    /// No report is stored for this job.
    #[snafu(display("no report stored for job {id}"))]
    ReportNotFound {
        /// Job id the report was requested for.
        id: String,
    },

    /// The repository-query collaborator failed to resolve changed resources.
    #[snafu(display("failed to resolve changed resources of project {project}: {reason}"))]
    ResolveFailed {
        /// Project being resolved.
        project: String,
        /// Failure description.
        reason: String,
    },

    /// The durable store failed.
    #[snafu(display("storage error: {source}"))]
    Storage {
        /// Source error.
        source: KeyValueStoreError,
    },

    /// A persisted record could not be (de)serialized.
    #[snafu(display("serialization error: {source}"))]
    Serialization {
        /// Source error.
        source: serde_json::Error,
    },

    /// The lock service failed (storage problems, not contention — a held
    /// lock surfaces as [`PublishError::LockConflict`]).
    #[snafu(display("lock service error: {source}"))]
    Lock {
        /// Source error.
        source: LockError,
    },
}

// Automatic conversions for common error types
impl From<KeyValueStoreError> for PublishError {
    fn from(err: KeyValueStoreError) -> Self {
        Self::Storage { source: err }
    }
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization { source: err }
    }
}

impl From<LockError> for PublishError {
    fn from(err: LockError) -> Self {
        Self::Lock { source: err }
    }
}
