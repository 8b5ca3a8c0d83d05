//! The publish engine: queue and history ownership, the single background
//! worker, and the public lifecycle API.

mod lifecycle;
mod storage;
mod worker;

use std::sync::Arc;

use folio_core::KeyValueStore;
use folio_locks::ResourceLockManager;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::sync::Notify;
use tokio::sync::watch;
use tokio_util::task::TaskTracker;
use tracing::warn;

use crate::events;
use crate::events::ListenerBus;
use crate::job::JobId;
use crate::job::PublishJob;
use crate::processor::ChangeResolver;
use crate::processor::ResourceProcessor;
use crate::queue::PublishHistory;
use crate::queue::PublishQueue;
use crate::types::ResourcePath;

/// Configuration for the publish engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Maximum number of terminal jobs retained in the history.
    pub history_size: usize,
    /// TTL stamped on publish locks, in milliseconds. Locks left behind by
    /// a crashed process expire after this long.
    pub lock_ttl_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            history_size: 10,
            lock_ttl_ms: 60 * 60 * 1000, // 1 hour
        }
    }
}

/// Mutable engine state, guarded by the single engine mutex.
///
/// Everything the worker and the public API both touch lives here; taking
/// the mutex is what serializes `initialize` against the worker loop and
/// concurrent publish/abort calls.
pub(crate) struct EngineState {
    pub(crate) queue: PublishQueue,
    pub(crate) history: PublishHistory,
    pub(crate) running: Option<PublishJob>,
    /// Set by `stop_publishing`; the worker does not dequeue while set.
    pub(crate) paused: bool,
    /// Cleared by `disable`; non-administrators cannot publish while unset.
    pub(crate) enabled: bool,
    /// Bumped by every `initialize`; an in-flight execution whose epoch is
    /// stale discards its results.
    pub(crate) epoch: u64,
}

/// State shared between the engine handle, the worker task and the event
/// dispatcher.
pub(crate) struct EngineShared<S: KeyValueStore + ?Sized> {
    pub(crate) locks: ResourceLockManager<S>,
    pub(crate) store: Arc<S>,
    pub(crate) resolver: Arc<dyn ChangeResolver>,
    pub(crate) processor: Arc<dyn ResourceProcessor>,
    pub(crate) config: PublishConfig,
    pub(crate) state: Mutex<EngineState>,
    /// Wakes the worker after an enqueue or a resume.
    pub(crate) wake: Notify,
    /// Flipped to true exactly once, on shutdown.
    pub(crate) shutdown_tx: watch::Sender<bool>,
    /// True whenever the worker has nothing to do (no running job and the
    /// queue is empty or paused).
    pub(crate) idle_tx: watch::Sender<bool>,
    pub(crate) bus: ListenerBus,
}

impl<S: KeyValueStore + ?Sized + 'static> EngineShared<S> {
    /// Recompute the idle flag from `state`.
    pub(crate) fn refresh_idle(&self, state: &EngineState) {
        let idle = state.running.is_none() && (state.paused || state.queue.is_empty());
        self.idle_tx.send_replace(idle);
    }

    /// Epoch at this instant; used by the worker to detect a concurrent
    /// re-initialization.
    pub(crate) async fn current_epoch(&self) -> u64 {
        self.state.lock().await.epoch
    }

    /// Release the publish locks a job holds on `resources`, unconditionally
    /// and best effort: a failing release is logged, the rest proceed.
    pub(crate) async fn release_locks(&self, holder: &JobId, resources: &[ResourcePath]) {
        for resource in resources {
            if let Err(e) = self.locks.release(resource.as_str(), holder.as_str()).await {
                warn!(
                    job_id = %holder,
                    resource = %resource,
                    error = %e,
                    "failed to release publish lock"
                );
            }
        }
    }
}

/// The publish engine.
///
/// A cheaply cloneable handle over shared state; construct one instance at
/// process start and pass it to every caller. The background worker and the
/// event dispatcher are spawned on construction, so `new` must be called
/// from within a Tokio runtime. The engine starts accepting and processing
/// immediately.
pub struct PublishEngine<S: KeyValueStore + ?Sized> {
    shared: Arc<EngineShared<S>>,
    tracker: TaskTracker,
}

impl<S: KeyValueStore + ?Sized> Clone for PublishEngine<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            tracker: self.tracker.clone(),
        }
    }
}

impl<S: KeyValueStore + ?Sized + 'static> PublishEngine<S> {
    /// Create an engine with the default configuration.
    pub fn new(
        store: Arc<S>,
        resolver: Arc<dyn ChangeResolver>,
        processor: Arc<dyn ResourceProcessor>,
    ) -> Self {
        Self::with_config(store, resolver, processor, PublishConfig::default())
    }

    /// Create an engine with a custom configuration.
    pub fn with_config(
        store: Arc<S>,
        resolver: Arc<dyn ChangeResolver>,
        processor: Arc<dyn ResourceProcessor>,
        config: PublishConfig,
    ) -> Self {
        // Tiger Style: a zero-sized history cannot hold terminal jobs
        assert!(config.history_size > 0, "history_size must be positive");

        let (bus, events_rx) = ListenerBus::new();
        let (shutdown_tx, _) = watch::channel(false);
        let (idle_tx, _) = watch::channel(true);

        let shared = Arc::new(EngineShared {
            locks: ResourceLockManager::new(store.clone()),
            store,
            resolver,
            processor,
            state: Mutex::new(EngineState {
                queue: PublishQueue::new(),
                history: PublishHistory::new(config.history_size),
                running: None,
                paused: false,
                enabled: true,
                epoch: 0,
            }),
            config,
            wake: Notify::new(),
            shutdown_tx,
            idle_tx,
            bus,
        });

        let tracker = TaskTracker::new();
        tracker.spawn(events::run_dispatcher(
            shared.bus.registry(),
            events_rx,
            shared.shutdown_tx.subscribe(),
        ));
        tracker.spawn(worker::run(shared.clone()));

        Self { shared, tracker }
    }

    /// Point-in-time snapshot of the queued jobs, oldest first.
    ///
    /// The copy does not track concurrent mutation.
    pub async fn publish_queue(&self) -> Vec<PublishJob> {
        self.shared.state.lock().await.queue.snapshot()
    }

    /// Point-in-time snapshot of the retained terminal jobs, oldest first.
    pub async fn publish_history(&self) -> Vec<PublishJob> {
        self.shared.state.lock().await.history.snapshot()
    }

    /// True while a job is in the `Running` state.
    pub async fn is_running(&self) -> bool {
        self.shared.state.lock().await.running.is_some()
    }

    /// Wait until the worker is idle: no running job and, unless publishing
    /// is stopped, an empty queue. Returns immediately when already idle.
    pub async fn wait_while_running(&self) {
        let mut idle = self.shared.idle_tx.subscribe();
        // The sender lives in shared state, so wait_for cannot fail while
        // this handle exists.
        let _ = idle.wait_for(|idle| *idle).await;
    }

    /// Stop the worker and dispatcher tasks and wait for them to exit.
    ///
    /// An in-flight job is allowed to finish first; queued jobs stay
    /// persisted for the next start. Events already posted are delivered
    /// best effort before the dispatcher exits.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.shared.shutdown_tx.send_replace(true);
        self.tracker.wait().await;
    }

    pub(crate) fn shared(&self) -> &Arc<EngineShared<S>> {
        &self.shared
    }
}
