//! First-in-first-out eviction.
//!
//! Insertion order only. Accesses are deliberately ignored, so a hot key
//! still ages out once everything inserted before it is gone.

use crate::ds::RecencyList;
use crate::policy::EvictionPolicy;

/// FIFO queue over the recency list, with accesses ignored.
#[derive(Debug, Default)]
pub struct FifoPolicy {
    list: RecencyList<String>,
}

impl FifoPolicy {
    /// Creates an empty policy.
    pub fn new() -> Self {
        Self {
            list: RecencyList::unbounded(),
        }
    }
}

impl EvictionPolicy for FifoPolicy {
    fn record_insert(&mut self, key: &str) {
        // An overwrite keeps the original queue position.
        if !self.list.contains(key) {
            self.list.record(&key.to_owned());
        }
    }

    fn record_access(&mut self, _key: &str) {}

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
        "fifo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_in_insertion_order() {
        let mut p = FifoPolicy::new();
        p.record_insert("a");
        p.record_insert("b");
        p.record_insert("c");
        // Access has no effect on order.
        p.record_access("a");
        p.record_access("a");
        assert_eq!(p.pick_victim().as_deref(), Some("a"));
        assert_eq!(p.pick_victim().as_deref(), Some("b"));
        assert_eq!(p.pick_victim().as_deref(), Some("c"));
    }

    #[test]
    fn overwrite_keeps_queue_position() {
        let mut p = FifoPolicy::new();
        p.record_insert("a");
        p.record_insert("b");
        p.record_insert("a");
        assert_eq!(p.len(), 2);
        assert_eq!(p.pick_victim().as_deref(), Some("a"));
    }
}
