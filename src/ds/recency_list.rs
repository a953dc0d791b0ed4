//! Keyed recency ordering: an [`IntrusiveList`] of keys plus a key index.
//!
//! The workhorse of the policy layer. Unbounded, it is the recency order
//! behind LRU/FIFO/MRU and the resident lists of ARC and 2Q. Bounded, it is
//! a ghost list: a record of recently evicted keys (no values) whose oldest
//! entry falls off when capacity is reached.
//!
//! ```text
//!   index: FxHashMap<K, SlotId>        list
//!   ┌───────┬───────┐                  head ─► [A] ◄──► [B] ◄──► [C] ◄── tail
//!   │  A    │ id_1  │                    newest                  oldest
//!   │  B    │ id_2  │
//!   └───────┴───────┘
//! ```
//!
//! ## Behavior
//! - `record(k)`: insert at front, or move existing key to front; evicts the
//!   oldest key when bounded and full
//! - `pop_oldest` / `pop_newest`: O(1) eviction from either end
//! - `remove` / `contains`: O(1) average

use std::borrow::Borrow;
use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::intrusive_list::IntrusiveList;
use crate::ds::slot_arena::SlotId;

/// Recency-ordered key list with O(1) membership, optionally bounded.
#[derive(Debug)]
pub struct RecencyList<K> {
    list: IntrusiveList<K>,
    index: FxHashMap<K, SlotId>,
    capacity: Option<usize>,
}

impl<K> Default for RecencyList<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<K> RecencyList<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an unbounded recency list.
    pub fn unbounded() -> Self {
        Self {
            list: IntrusiveList::new(),
            index: FxHashMap::default(),
            capacity: None,
        }
    }

    /// Creates a bounded list (ghost-list form) holding at most `capacity`
    /// keys; recording beyond that drops the oldest key.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            list: IntrusiveList::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity: Some(capacity),
        }
    }

    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Returns `true` if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Returns `true` if the key is tracked.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Records a key as most recent: inserts at the front, or moves an
    /// existing entry to the front. Returns the key dropped from the oldest
    /// end if the bounded capacity was exceeded.
    pub fn record(&mut self, key: &K) -> Option<K> {
        if let Some(&id) = self.index.get(key) {
            self.list.move_to_front(id);
            return None;
        }
        let id = self.list.push_front(key.clone());
        self.index.insert(key.clone(), id);
        if let Some(cap) = self.capacity {
            if self.list.len() > cap {
                return self.pop_oldest();
            }
        }
        None
    }

    /// Inserts a key at the oldest end (used when demoting entries).
    pub fn record_oldest(&mut self, key: &K) -> Option<K> {
        if self.index.contains_key(key) {
            // Already tracked; leave its position alone.
            return None;
        }
        let id = self.list.push_back(key.clone());
        self.index.insert(key.clone(), id);
        if let Some(cap) = self.capacity {
            if self.list.len() > cap {
                return self.pop_oldest();
            }
        }
        None
    }

    /// Moves an existing key to the front. Returns `false` if untracked.
    pub fn touch<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&id) => self.list.move_to_front(id),
            None => false,
        }
    }

    /// Removes and returns the oldest key.
    pub fn pop_oldest(&mut self) -> Option<K> {
        let key = self.list.pop_back()?;
        self.index.remove(&key);
        Some(key)
    }

    /// Removes and returns the newest key.
    pub fn pop_newest(&mut self) -> Option<K> {
        let key = self.list.pop_front()?;
        self.index.remove(&key);
        Some(key)
    }

    /// Removes a key. Returns `true` if it was tracked.
    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.remove(key) {
            Some(id) => {
                self.list.remove(id);
                true
            },
            None => false,
        }
    }

    /// Iterates keys from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.list.iter()
    }

    /// Drops all keys.
    pub fn clear(&mut self) {
        self.list.clear();
        self.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(list: &RecencyList<&'static str>) -> Vec<&'static str> {
        list.iter().copied().collect()
    }

    #[test]
    fn default_is_an_empty_unbounded_list() {
        let mut list: RecencyList<String> = RecencyList::default();
        assert!(list.is_empty());
        for i in 0..100 {
            assert!(list.record(&format!("k{i}")).is_none());
        }
        assert_eq!(list.len(), 100);
    }

    #[test]
    fn record_orders_newest_first() {
        let mut list = RecencyList::unbounded();
        list.record(&"a");
        list.record(&"b");
        list.record(&"c");
        assert_eq!(keys(&list), vec!["c", "b", "a"]);

        // Re-recording moves to the front instead of duplicating.
        list.record(&"a");
        assert_eq!(keys(&list), vec!["a", "c", "b"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn bounded_list_drops_oldest() {
        let mut ghost = RecencyList::bounded(2);
        assert_eq!(ghost.record(&"a"), None);
        assert_eq!(ghost.record(&"b"), None);
        assert_eq!(ghost.record(&"c"), Some("a"));
        assert!(!ghost.contains(&"a"));
        assert!(ghost.contains(&"b"));
        assert!(ghost.contains(&"c"));
    }

    #[test]
    fn pop_from_both_ends() {
        let mut list = RecencyList::unbounded();
        list.record(&"old");
        list.record(&"mid");
        list.record(&"new");
        assert_eq!(list.pop_oldest(), Some("old"));
        assert_eq!(list.pop_newest(), Some("new"));
        assert_eq!(list.pop_oldest(), Some("mid"));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_untracks_key() {
        let mut list = RecencyList::unbounded();
        list.record(&"a");
        list.record(&"b");
        assert!(list.remove(&"a"));
        assert!(!list.remove(&"a"));
        assert_eq!(keys(&list), vec!["b"]);
    }

    #[test]
    fn record_oldest_appends_at_back() {
        let mut list = RecencyList::unbounded();
        list.record(&"front");
        list.record_oldest(&"back");
        assert_eq!(keys(&list), vec!["front", "back"]);
        assert_eq!(list.pop_oldest(), Some("back"));
    }
}
