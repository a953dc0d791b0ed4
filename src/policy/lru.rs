//! Least-recently-used eviction.
//!
//! A single recency list: inserts and accesses move a key to the front,
//! victims come off the back. All operations are O(1).

use crate::ds::RecencyList;
use crate::policy::EvictionPolicy;

/// Classic LRU over a doubly-linked recency list.
#[derive(Debug, Default)]
pub struct LruPolicy {
    list: RecencyList<String>,
}

impl LruPolicy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self {
            list: RecencyList::unbounded(),
        }
    }
}

impl EvictionPolicy for LruPolicy {
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
        self.list.pop_oldest()
    }

    fn clear(&mut self) {
        self.list.clear();
    }

    fn len(&self) -> usize {
        self.list.len()
    }

    fn name(&self) -> &'static str {
        "lru"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let mut p = LruPolicy::new();
        p.record_insert("a");
        p.record_insert("b");
        p.record_insert("c");
        p.record_access("a");
        assert_eq!(p.pick_victim().as_deref(), Some("b"));
        assert_eq!(p.pick_victim().as_deref(), Some("c"));
        assert_eq!(p.pick_victim().as_deref(), Some("a"));
        assert!(p.pick_victim().is_none());
    }

    #[test]
    fn reinsert_refreshes_position() {
        let mut p = LruPolicy::new();
        p.record_insert("a");
        p.record_insert("b");
        p.record_insert("a");
        assert_eq!(p.len(), 2);
        assert_eq!(p.pick_victim().as_deref(), Some("b"));
    }

    #[test]
    fn remove_is_silent() {
        let mut p = LruPolicy::new();
        p.record_insert("a");
        p.record_remove("a");
        p.record_remove("missing");
        assert!(p.is_empty());
    }
}
