//! Collaborator seams of the engine.
//!
//! The engine never transforms content and never decides what "all changed
//! resources of a project" means; both concerns are delegated through the
//! traits here.

use async_trait::async_trait;

use crate::job::PublishJob;
use crate::types::ProjectId;
use crate::types::ResourcePath;

/// The opaque unit of work executed for each resource of a running job.
///
/// Implementations perform the actual content transformation and export.
/// The engine sequences calls resource by resource and records outcomes in
/// the job report: an error here is a per-resource failure, recorded as
/// data — it does not fail the job.
#[async_trait]
pub trait ResourceProcessor: Send + Sync {
    /// Publish a single resource of `job`.
    async fn process(&self, job: &PublishJob, resource: &ResourcePath) -> anyhow::Result<()>;
}

/// Repository-query collaborator resolving a project's changed resources.
///
/// Backing this with the repository's change tracking is the host system's
/// concern; the engine only consumes the resulting list.
#[async_trait]
pub trait ChangeResolver: Send + Sync {
    /// List the changed resources a full publish of `project` should cover.
    async fn changed_resources(&self, project: &ProjectId) -> anyhow::Result<Vec<ResourcePath>>;
}
