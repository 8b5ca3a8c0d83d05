//! Key-value operation types.
//!
//! Every record the engine persists (jobs, queue and history indexes, lock
//! state, reports) goes through these types.

use serde::Deserialize;
use serde::Serialize;

/// Maximum allowed key length in bytes.
pub const MAX_KEY_SIZE: usize = 1024;

/// Maximum allowed value size in bytes.
pub const MAX_VALUE_SIZE: usize = 4 * 1024 * 1024;

/// Maximum entries returned by a single scan.
pub const MAX_SCAN_RESULTS: u32 = 10_000;

/// Commands for modifying key-value state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteCommand {
    /// Set a single key-value pair.
    Set { key: String, value: String },
    /// Delete a single key. Deleting an absent key is a no-op.
    Delete { key: String },
    /// Atomically replace the value if the current value matches `expected`
    /// (`None` means the key must not exist).
    CompareAndSwap {
        key: String,
        expected: Option<String>,
        new_value: String,
    },
    /// Atomically delete the key if the current value matches `expected`.
    CompareAndDelete { key: String, expected: String },
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteRequest {
    /// The command to apply.
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a `Set` command to store a key-value pair.
    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Set {
                key: key.into(),
                value: value.into(),
            },
        }
    }

    /// Create a `Delete` command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }

    /// Create a `CompareAndSwap` command.
    pub fn compare_and_swap(
        key: impl Into<String>,
        expected: Option<String>,
        new_value: impl Into<String>,
    ) -> Self {
        Self {
            command: WriteCommand::CompareAndSwap {
                key: key.into(),
                expected,
                new_value: new_value.into(),
            },
        }
    }

    /// Create a `CompareAndDelete` command.
    pub fn compare_and_delete(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndDelete {
                key: key.into(),
                expected: expected.into(),
            },
        }
    }
}

/// Result of a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteResult {
    /// Version assigned to the written key, 0 for deletes.
    pub version: u64,
}

/// Request to read a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    /// The key to read.
    pub key: String,
}

impl ReadRequest {
    /// Create a read request for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// A stored key-value entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValueEntry {
    /// The key identifying this entry.
    pub key: String,
    /// The stored value.
    pub value: String,
    /// Key-specific version, incremented on every write, starting at 1.
    pub version: u64,
}

/// Result of a read. `kv` is `None` when the key does not exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResult {
    /// The entry, if present.
    pub kv: Option<KeyValueEntry>,
}

/// Request to scan keys sharing a prefix, in lexicographic key order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    /// Key prefix to match.
    pub prefix: String,
    /// Maximum entries to return; clamped to [`MAX_SCAN_RESULTS`].
    pub limit: Option<u32>,
}

/// Result of a prefix scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    /// Matching entries in key order.
    pub entries: Vec<KeyValueEntry>,
    /// True when more matching entries exist beyond the limit.
    pub is_truncated: bool,
}
