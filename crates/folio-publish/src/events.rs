//! Lifecycle events and the listener bus.
//!
//! Transitions post events onto an ordered channel while the engine state
//! lock is held (the send never blocks), and a dedicated dispatcher task
//! delivers them to every registered listener in registration order. Because
//! the dispatcher holds no engine lock, a listener may call back into the
//! engine — including triggering a re-initialization — without deadlocking.
//!
//! Delivery is exactly once per transition; the single channel preserves the
//! per-job order enqueue → start → finish (or enqueue → abort).

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::debug;
use tracing::warn;

use crate::job::PublishJob;

/// A lifecycle event, carrying a snapshot of the job at transition time.
#[derive(Debug, Clone)]
pub enum PublishEvent {
    /// The job entered the queue.
    Enqueued(PublishJob),
    /// The worker began executing the job.
    Started(PublishJob),
    /// The job completed normally.
    Finished(PublishJob),
    /// The job was aborted.
    Aborted(PublishJob),
    /// The job was evicted from the bounded history.
    Removed(PublishJob),
}

impl PublishEvent {
    /// The job snapshot the event carries.
    pub fn job(&self) -> &PublishJob {
        match self {
            Self::Enqueued(job)
            | Self::Started(job)
            | Self::Finished(job)
            | Self::Aborted(job)
            | Self::Removed(job) => job,
        }
    }

    /// Short event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enqueued(_) => "enqueue",
            Self::Started(_) => "start",
            Self::Finished(_) => "finish",
            Self::Aborted(_) => "abort",
            Self::Removed(_) => "remove",
        }
    }
}

/// Observer of publish lifecycle events.
///
/// All methods default to no-ops so implementations override only what they
/// track. Panics are caught and logged by the dispatcher; they never reach
/// the engine or other listeners.
#[async_trait]
pub trait PublishListener: Send + Sync {
    /// Called when a job enters the queue.
    async fn on_enqueue(&self, _job: &PublishJob) {}

    /// Called when the worker begins executing a job.
    async fn on_start(&self, _job: &PublishJob) {}

    /// Called when a job completes normally.
    async fn on_finish(&self, _job: &PublishJob) {}

    /// Called when a job is aborted.
    async fn on_abort(&self, _job: &PublishJob) {}

    /// Called when a job is evicted from the bounded history.
    async fn on_remove(&self, _job: &PublishJob) {}
}

/// Handle identifying a registered listener, returned by
/// [`crate::PublishEngine::add_publish_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub(crate) struct RegisteredListener {
    id: ListenerId,
    listener: Arc<dyn PublishListener>,
}

pub(crate) type Registry = Arc<RwLock<Vec<RegisteredListener>>>;

/// Listener registry plus the sending half of the event channel.
pub(crate) struct ListenerBus {
    registry: Registry,
    sender: mpsc::UnboundedSender<PublishEvent>,
    next_id: AtomicU64,
}

impl ListenerBus {
    /// Create the bus and the receiving end for the dispatcher task.
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<PublishEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let bus = Self {
            registry: Arc::new(RwLock::new(Vec::new())),
            sender,
            next_id: AtomicU64::new(1),
        };
        (bus, receiver)
    }

    /// Register a listener; events are delivered in registration order.
    pub(crate) fn add(&self, listener: Arc<dyn PublishListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = lock_registry_mut(&self.registry);
        registry.push(RegisteredListener { id, listener });
        id
    }

    /// Unregister a listener. Returns false when the id is unknown.
    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut registry = lock_registry_mut(&self.registry);
        let before = registry.len();
        registry.retain(|entry| entry.id != id);
        registry.len() != before
    }

    /// Post an event for dispatch. Never blocks; safe to call under the
    /// engine state lock.
    pub(crate) fn emit(&self, event: PublishEvent) {
        if self.sender.send(event).is_err() {
            warn!("event dispatcher is gone; dropping publish event");
        }
    }

    /// Shared registry handle for the dispatcher task.
    pub(crate) fn registry(&self) -> Registry {
        self.registry.clone()
    }
}

/// Dispatcher loop: delivers events until the engine shuts down, then
/// drains whatever is already queued.
pub(crate) async fn run_dispatcher(
    registry: Registry,
    mut events: mpsc::UnboundedReceiver<PublishEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    debug!("publish event dispatcher started");
    loop {
        tokio::select! {
            maybe = events.recv() => match maybe {
                Some(event) => deliver(&registry, event).await,
                None => break,
            },
            _ = shutdown.changed() => {
                while let Ok(event) = events.try_recv() {
                    deliver(&registry, event).await;
                }
                break;
            }
        }
    }
    debug!("publish event dispatcher stopped");
}

/// The registry guards are held only long enough to copy; a poisoned guard
/// still carries usable data, so poisoning is ignored rather than escalated.
fn lock_registry_mut(registry: &Registry) -> std::sync::RwLockWriteGuard<'_, Vec<RegisteredListener>> {
    registry.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Deliver one event to every registered listener, in registration order.
async fn deliver(registry: &Registry, event: PublishEvent) {
    let listeners: Vec<(ListenerId, Arc<dyn PublishListener>)> = {
        let registry = registry.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.iter().map(|entry| (entry.id, entry.listener.clone())).collect()
    };

    for (id, listener) in listeners {
        let job = event.job();
        let call = async {
            match &event {
                PublishEvent::Enqueued(_) => listener.on_enqueue(job).await,
                PublishEvent::Started(_) => listener.on_start(job).await,
                PublishEvent::Finished(_) => listener.on_finish(job).await,
                PublishEvent::Aborted(_) => listener.on_abort(job).await,
                PublishEvent::Removed(_) => listener.on_remove(job).await,
            }
        };
        if AssertUnwindSafe(call).catch_unwind().await.is_err() {
            warn!(
                listener = id.0,
                event = event.name(),
                job_id = %job.id,
                "publish listener panicked during dispatch; continuing"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;
    use crate::job::JobId;
    use crate::types::Principal;
    use crate::types::ProjectId;
    use crate::types::ResourcePath;

    fn job(name: &str) -> PublishJob {
        PublishJob::new(
            JobId::from_string(name),
            Principal::new("editor"),
            ProjectId::new("site"),
            vec![ResourcePath::new(format!("/{name}"))],
        )
    }

    struct Recording {
        tag: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl PublishListener for Recording {
        async fn on_enqueue(&self, job: &PublishJob) {
            self.seen.lock().await.push(format!("{}:enqueue:{}", self.tag, job.id));
        }

        async fn on_abort(&self, job: &PublishJob) {
            self.seen.lock().await.push(format!("{}:abort:{}", self.tag, job.id));
        }
    }

    struct Panicky;

    #[async_trait]
    impl PublishListener for Panicky {
        async fn on_enqueue(&self, _job: &PublishJob) {
            panic!("listener blew up");
        }
    }

    #[tokio::test]
    async fn delivers_in_registration_order() {
        let (bus, receiver) = ListenerBus::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.add(Arc::new(Recording { tag: "first", seen: seen.clone() }));
        bus.add(Arc::new(Recording { tag: "second", seen: seen.clone() }));

        let handle = tokio::spawn(run_dispatcher(bus.registry(), receiver, shutdown_rx));

        bus.emit(PublishEvent::Enqueued(job("a")));
        bus.emit(PublishEvent::Aborted(job("a")));
        drop(bus);
        handle.await.unwrap();

        let seen = seen.lock().await;
        assert_eq!(
            *seen,
            vec![
                "first:enqueue:a".to_string(),
                "second:enqueue:a".to_string(),
                "first:abort:a".to_string(),
                "second:abort:a".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn panicking_listener_does_not_stop_dispatch() {
        let (bus, receiver) = ListenerBus::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.add(Arc::new(Panicky));
        bus.add(Arc::new(Recording { tag: "after", seen: seen.clone() }));

        let handle = tokio::spawn(run_dispatcher(bus.registry(), receiver, shutdown_rx));
        bus.emit(PublishEvent::Enqueued(job("a")));
        drop(bus);
        handle.await.unwrap();

        assert_eq!(*seen.lock().await, vec!["after:enqueue:a".to_string()]);
    }

    #[tokio::test]
    async fn removed_listener_stops_receiving() {
        let (bus, receiver) = ListenerBus::new();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let id = bus.add(Arc::new(Recording { tag: "gone", seen: seen.clone() }));
        assert!(bus.remove(id));
        assert!(!bus.remove(id));

        let handle = tokio::spawn(run_dispatcher(bus.registry(), receiver, shutdown_rx));
        bus.emit(PublishEvent::Enqueued(job("a")));
        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();

        assert!(seen.lock().await.is_empty());
    }
}
