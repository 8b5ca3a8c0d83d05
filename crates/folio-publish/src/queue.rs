//! FIFO queue of pending jobs and the bounded history of terminal jobs.
//!
//! Plain ordered containers. All synchronization and persistence happens in
//! the engine; snapshots handed to callers are defensive copies.

use std::collections::VecDeque;

use crate::job::JobId;
use crate::job::PublishJob;

/// Ordered collection of jobs waiting to be processed, oldest first.
#[derive(Debug, Default)]
pub(crate) struct PublishQueue {
    jobs: VecDeque<PublishJob>,
}

impl PublishQueue {
    /// Create an empty queue.
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a job at the tail.
    pub(crate) fn push(&mut self, job: PublishJob) {
        self.jobs.push_back(job);
    }

    /// Remove and return the oldest job.
    pub(crate) fn pop_front(&mut self) -> Option<PublishJob> {
        self.jobs.pop_front()
    }

    /// Look up a queued job by id.
    pub(crate) fn get(&self, id: &JobId) -> Option<&PublishJob> {
        self.jobs.iter().find(|job| job.id == *id)
    }

    /// Remove a queued job by id, keeping the order of the rest.
    pub(crate) fn remove(&mut self, id: &JobId) -> Option<PublishJob> {
        let position = self.jobs.iter().position(|job| job.id == *id)?;
        self.jobs.remove(position)
    }

    /// Iterate the queued jobs, oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PublishJob> {
        self.jobs.iter()
    }

    /// Number of queued jobs.
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when no job is queued.
    pub(crate) fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Defensive copy of the queue contents.
    pub(crate) fn snapshot(&self) -> Vec<PublishJob> {
        self.jobs.iter().cloned().collect()
    }
}

/// Insertion-ordered collection of terminal jobs, capped at a configured
/// capacity with oldest-first eviction.
#[derive(Debug)]
pub(crate) struct PublishHistory {
    jobs: VecDeque<PublishJob>,
    capacity: usize,
}

impl PublishHistory {
    /// Create an empty history holding at most `capacity` entries.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be positive");
        Self {
            jobs: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a terminal job, returning the evicted oldest entry when the
    /// history is at capacity.
    pub(crate) fn push(&mut self, job: PublishJob) -> Option<PublishJob> {
        debug_assert!(job.status.is_terminal(), "history only holds terminal jobs");

        let evicted = if self.jobs.len() == self.capacity {
            self.jobs.pop_front()
        } else {
            None
        };
        self.jobs.push_back(job);

        debug_assert!(self.jobs.len() <= self.capacity, "history exceeded its capacity");
        evicted
    }

    /// Look up a terminal job by id.
    pub(crate) fn find(&self, id: &JobId) -> Option<&PublishJob> {
        self.jobs.iter().find(|job| job.id == *id)
    }

    /// Iterate the retained jobs, oldest first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &PublishJob> {
        self.jobs.iter()
    }

    /// Number of retained jobs.
    pub(crate) fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Defensive copy of the history contents.
    pub(crate) fn snapshot(&self) -> Vec<PublishJob> {
        self.jobs.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn terminal(name: &str) -> PublishJob {
        let mut job = job(name);
        job.mark_aborted();
        job
    }

    #[test]
    fn queue_is_fifo() {
        let mut queue = PublishQueue::new();
        queue.push(job("a"));
        queue.push(job("b"));
        queue.push(job("c"));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop_front().unwrap().id.as_str(), "a");
        assert_eq!(queue.pop_front().unwrap().id.as_str(), "b");
        assert_eq!(queue.pop_front().unwrap().id.as_str(), "c");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn queue_remove_keeps_order() {
        let mut queue = PublishQueue::new();
        queue.push(job("a"));
        queue.push(job("b"));
        queue.push(job("c"));

        let removed = queue.remove(&JobId::from_string("b")).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert!(queue.remove(&JobId::from_string("b")).is_none());

        let order: Vec<_> = queue.iter().map(|j| j.id.as_str().to_string()).collect();
        assert_eq!(order, ["a", "c"]);
    }

    #[test]
    fn history_evicts_oldest_at_capacity() {
        let mut history = PublishHistory::new(2);
        assert!(history.push(terminal("a")).is_none());
        assert!(history.push(terminal("b")).is_none());

        let evicted = history.push(terminal("c")).unwrap();
        assert_eq!(evicted.id.as_str(), "a");
        assert_eq!(history.len(), 2);

        let order: Vec<_> = history.iter().map(|j| j.id.as_str().to_string()).collect();
        assert_eq!(order, ["b", "c"]);
    }

    #[test]
    fn history_find_by_id() {
        let mut history = PublishHistory::new(4);
        history.push(terminal("a"));
        assert!(history.find(&JobId::from_string("a")).is_some());
        assert!(history.find(&JobId::from_string("x")).is_none());
    }
}
