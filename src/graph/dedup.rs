//! Run-scoped set of emitted entity keys

use std::collections::HashSet;
use std::sync::Mutex;

/// Keys of shared entities already handed to the sink in this run
///
/// Check and insert happen under one lock, so concurrent callers racing on the
/// same key see exactly one winner.
#[derive(Debug, Default)]
pub struct DedupSet {
    keys: Mutex<HashSet<String>>,
}

impl DedupSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`; returns `true` if it was not present before.
    pub fn insert_if_absent(&self, key: &str) -> bool {
        let mut keys = self.keys.lock().unwrap_or_else(|e| e.into_inner());
        if keys.contains(key) {
            return false;
        }
        keys.insert(key.to_string())
    }

    /// Whether `key` was recorded
    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// No keys recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
