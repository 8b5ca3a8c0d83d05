//! Publish report artifacts.
//!
//! Every executed job writes a human-readable report, one entry per
//! resource, persisted through the store as it grows and sealed when the
//! job reaches a terminal state. Consumers verify a clean publish by
//! matching the per-resource [`REPORT_OK_MARKER`].

use std::sync::Arc;

use folio_core::KeyValueStore;
use folio_core::ReadRequest;
use folio_core::WriteRequest;
use tracing::error;

use crate::job::JobId;
use crate::job::JobStatus;
use crate::job::PublishJob;
use crate::types::ResourcePath;

/// Marker terminating the report entry of a successfully published resource.
pub const REPORT_OK_MARKER: &str = "o.k.";

/// Storage key of a job's report.
pub(crate) fn report_key(id: &JobId) -> String {
    format!("__publish:report:{id}")
}

/// Incrementally builds one job's report, writing through to the store so a
/// partially processed job leaves a durable trail.
///
/// Report persistence is best effort: a failing store write is logged and
/// the job carries on.
pub(crate) struct ReportWriter<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    key: String,
    contents: String,
}

impl<S: KeyValueStore + ?Sized> ReportWriter<S> {
    /// Create an empty report for `id`.
    pub(crate) fn new(store: Arc<S>, id: &JobId) -> Self {
        Self {
            store,
            key: report_key(id),
            contents: String::new(),
        }
    }

    /// Write the report header.
    pub(crate) async fn begin(&mut self, job: &PublishJob) {
        self.line(&format!(
            "Publish report for job {} (user {}, project {})",
            job.id, job.user.id, job.project
        ));
        self.line(&format!("{} resource(s) to publish", job.resources.len()));
        self.flush().await;
    }

    /// Record a successfully published resource.
    pub(crate) async fn resource_ok(&mut self, resource: &ResourcePath) {
        self.line(&format!("Publishing {resource} ... {REPORT_OK_MARKER}"));
        self.flush().await;
    }

    /// Record a resource that failed to publish.
    pub(crate) async fn resource_failed(&mut self, resource: &ResourcePath, reason: &str) {
        self.line(&format!("Publishing {resource} ... failed: {reason}"));
        self.flush().await;
    }

    /// Write the report footer and persist the final contents.
    pub(crate) async fn seal(&mut self, job: &PublishJob) {
        debug_assert!(job.status.is_terminal(), "report sealed before the job was terminal");

        match job.status {
            JobStatus::Aborted => self.line("Publish job aborted."),
            _ => self.line("Publish job finished."),
        }
        self.flush().await;
    }

    fn line(&mut self, text: &str) {
        self.contents.push_str(text);
        self.contents.push('\n');
    }

    async fn flush(&self) {
        let request = WriteRequest::set(&self.key, &self.contents);
        if let Err(e) = self.store.write(request).await {
            error!(key = %self.key, error = %e, "failed to persist publish report");
        }
    }
}

/// Append an aborted footer to a report left behind by an interrupted job.
///
/// Used during re-initialization, where no [`ReportWriter`] with the
/// accumulated contents exists anymore: the stored text is extended in
/// place.
pub(crate) async fn seal_interrupted<S: KeyValueStore + ?Sized>(store: &Arc<S>, id: &JobId) {
    let key = report_key(id);
    let existing = match store.read(ReadRequest::new(&key)).await {
        Ok(result) => result.kv.map(|entry| entry.value).unwrap_or_default(),
        Err(e) => {
            error!(key = %key, error = %e, "failed to read report of interrupted job");
            return;
        }
    };

    let mut contents = existing;
    contents.push_str("Publish job aborted.\n");
    if let Err(e) = store.write(WriteRequest::set(&key, contents)).await {
        error!(key = %key, error = %e, "failed to seal report of interrupted job");
    }
}
