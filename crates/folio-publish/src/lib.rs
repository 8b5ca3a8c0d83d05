//! Publish job scheduling engine for the folio content repository.
//!
//! The engine accepts requests to publish a set of changed resources,
//! serializes them into a single-worker pipeline, tracks each job through
//! enqueued → running → finished/aborted, keeps a bounded history of
//! completed jobs, and notifies registered listeners at every lifecycle
//! transition.
//!
//! # Guarantees
//!
//! - Jobs start in strict FIFO order of enqueue time; at most one job is
//!   running at any instant.
//! - Every resource of a queued or running job holds a publish lock from
//!   enqueue until the job leaves the pipeline; locks are released
//!   unconditionally when a job reaches a terminal state.
//! - A job still enqueued can be aborted; a running job cannot and always
//!   runs to completion. Per-resource failures are recorded in the job
//!   report, not escalated to job failure.
//! - Lifecycle events are delivered to listeners exactly once per
//!   transition, in per-job order, from a dispatcher task that holds no
//!   engine lock — listeners may call back into the engine freely.
//!
//! # Example
//!
//! ```ignore
//! use folio_publish::{PublishEngine, Principal, ProjectId, ResourcePath};
//!
//! let engine = PublishEngine::new(store, resolver, processor);
//! let user = Principal::new("editor");
//! let project = ProjectId::new("website");
//!
//! let job_id = engine
//!     .publish(vec![ResourcePath::new("/site/index.html")], &user, &project)
//!     .await?;
//! engine.wait_while_running().await;
//! let report = engine.report_contents(&job_id).await?;
//! ```

#![warn(missing_docs)]

mod engine;
mod error;
mod events;
mod job;
mod processor;
mod queue;
mod report;
mod types;

pub use engine::PublishConfig;
pub use engine::PublishEngine;
pub use error::PublishError;
pub use error::Result;
pub use events::ListenerId;
pub use events::PublishEvent;
pub use events::PublishListener;
pub use job::JobId;
pub use job::JobStatus;
pub use job::PublishJob;
pub use processor::ChangeResolver;
pub use processor::ResourceProcessor;
pub use report::REPORT_OK_MARKER;
pub use types::Principal;
pub use types::ProjectId;
pub use types::ResourcePath;
pub use types::normalize_resource_set;
