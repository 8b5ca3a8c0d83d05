//! The single background worker that drains the publish queue.
//!
//! Exactly one worker task exists per engine, which is what makes the
//! single-runner invariant hold: a job is popped and transitioned to
//! `Running` under the engine mutex, executed without the mutex held, and
//! finalized under the mutex again. An `initialize` that lands in between
//! bumps the epoch; the worker detects the stale epoch and discards its
//! results (the job was already recorded as aborted and its locks
//! released).

use std::sync::Arc;

use folio_core::KeyValueStore;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::EngineShared;
use crate::events::PublishEvent;
use crate::job::PublishJob;
use crate::report::ReportWriter;

/// Worker loop; runs until shutdown.
pub(crate) async fn run<S: KeyValueStore + ?Sized + 'static>(shared: Arc<EngineShared<S>>) {
    let mut shutdown = shared.shutdown_tx.subscribe();
    debug!("publish worker started");

    loop {
        if *shutdown.borrow() {
            break;
        }
        match begin_next_job(&shared).await {
            Some((job, epoch)) => execute_job(&shared, job, epoch).await,
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    debug!("publish worker stopped");
}

/// Pop the oldest enqueued job and transition it to `Running`.
///
/// Returns `None` when the queue is empty or publishing is paused. The
/// returned epoch identifies the engine generation this execution belongs
/// to.
async fn begin_next_job<S: KeyValueStore + ?Sized + 'static>(
    shared: &Arc<EngineShared<S>>,
) -> Option<(PublishJob, u64)> {
    let mut state = shared.state.lock().await;
    if state.paused {
        return None;
    }
    let mut job = state.queue.pop_front()?;

    debug_assert!(state.running.is_none(), "a job is already running");

    job.mark_started();
    state.running = Some(job.clone());
    let epoch = state.epoch;

    shared.persist_job(&job).await;
    shared.persist_queue_index(&state).await;
    shared.persist_running_marker(Some(&job.id)).await;
    shared.bus.emit(PublishEvent::Started(job.clone()));
    shared.refresh_idle(&state);

    info!(job_id = %job.id, resources = job.resources.len(), "publish job started");
    Some((job, epoch))
}

/// Execute a running job and finalize it as `Finished`.
async fn execute_job<S: KeyValueStore + ?Sized + 'static>(
    shared: &Arc<EngineShared<S>>,
    mut job: PublishJob,
    epoch: u64,
) {
    let mut report = ReportWriter::new(shared.store.clone(), &job.id);
    report.begin(&job).await;

    let mut failures = 0usize;
    for resource in job.resources.clone() {
        let outcome = shared.processor.process(&job, &resource).await;

        // A concurrent initialize may have taken the job over; from then on
        // this execution records nothing more.
        if shared.current_epoch().await != epoch {
            warn!(job_id = %job.id, "abandoning publish job output, engine was re-initialized");
            return;
        }

        match outcome {
            Ok(()) => report.resource_ok(&resource).await,
            Err(e) => {
                failures += 1;
                warn!(job_id = %job.id, resource = %resource, error = %e, "resource failed to publish");
                report.resource_failed(&resource, &e.to_string()).await;
            }
        }
    }

    let mut state = shared.state.lock().await;
    if state.epoch != epoch {
        warn!(job_id = %job.id, "abandoning publish job result, engine was re-initialized");
        return;
    }

    job.mark_finished();
    state.running = None;

    // Locks are released unconditionally when the job leaves Running.
    shared.release_locks(&job.id, &job.resources).await;
    report.seal(&job).await;

    let evicted = state.history.push(job.clone());
    shared.persist_job(&job).await;
    shared.persist_history_index(&state).await;
    shared.persist_running_marker(None).await;
    if let Some(old) = &evicted {
        shared.remove_job_record(&old.id).await;
    }
    if let Some(old) = evicted {
        shared.bus.emit(PublishEvent::Removed(old));
    }
    shared.bus.emit(PublishEvent::Finished(job.clone()));
    shared.refresh_idle(&state);

    info!(job_id = %job.id, failures, "publish job finished");
}
