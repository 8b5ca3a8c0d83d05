//! Lock state types.

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

/// Kind of lock held on a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    /// Held by the publish engine for the duration of a publish job. Blocks
    /// edits and other publishes; only the engine releases it.
    Publish,
    /// Held by an interactive session editing the resource.
    Edit,
}

impl LockKind {
    /// Short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publish => "publish",
            Self::Edit => "edit",
        }
    }
}

/// Persisted state of one resource lock.
///
/// Stored as JSON under `__locks:resource:{path}` and replaced atomically
/// through compare-and-swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockState {
    /// Resource path the lock covers.
    pub resource: String,
    /// Identity of the holder: a job id for publish locks, a session id for
    /// edit locks.
    pub holder_id: String,
    /// Lock kind.
    pub kind: LockKind,
    /// Expiry, unix milliseconds.
    pub deadline_ms: u64,
    /// Creation time, unix milliseconds.
    pub created_at_ms: u64,
}

impl LockState {
    /// Build a fresh lock state expiring `ttl_ms` from now.
    pub(crate) fn new(resource: &str, holder_id: &str, kind: LockKind, ttl_ms: u64) -> Self {
        let now = now_unix_ms();
        Self {
            resource: resource.to_string(),
            holder_id: holder_id.to_string(),
            kind,
            deadline_ms: now + ttl_ms,
            created_at_ms: now,
        }
    }

    /// True when the lock's deadline has passed.
    pub fn is_expired(&self) -> bool {
        now_unix_ms() >= self.deadline_ms
    }
}

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lock is now held by the caller.
    Acquired {
        /// Expiry of the granted lock, unix milliseconds.
        deadline_ms: u64,
    },
    /// The resource is locked by someone else.
    Held {
        /// Holder of the conflicting lock.
        holder_id: String,
        /// Kind of the conflicting lock.
        kind: LockKind,
    },
}

/// Key under which a resource's lock state is stored.
pub(crate) fn lock_key(resource: &str) -> String {
    format!("__locks:resource:{resource}")
}

/// Current unix time in milliseconds.
pub(crate) fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as u64
}
