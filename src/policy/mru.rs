//! Most-recently-used eviction.
//!
//! The inverse of LRU: victims come off the newest end. Useful for cyclic
//! scans larger than the cache, where the most recently touched key is the
//! one furthest from its next use.

use crate::ds::RecencyList;
use crate::policy::EvictionPolicy;

/// MRU over the shared recency list, evicting from the newest end.
#[derive(Debug, Default)]
pub struct MruPolicy {
    list: RecencyList<String>,
}

impl MruPolicy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self {
            list: RecencyList::unbounded(),
        }
    }
}

impl EvictionPolicy for MruPolicy {
    fn record_insert(&mut self, key: &str) {
        self.list.record(&key.to_owned());
    }

    fn record_access(&mut self, key: &str) {
        self.list.touch(key);
    }

    fn record_remove(&mut self, key: &str) {
        self.list.remove(key);
    }

    fn pick_victim(&mut self) -> Option<String> {
        self.list.pop_newest()
    }

    fn clear(&mut self) {
        self.list.clear();
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn name(&self) -> &'static str {
        "mru"
    }
}
