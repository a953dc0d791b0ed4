//! Doubly linked list over [`SlotArena`] slots.
//!
//! Nodes live in the arena and link to each other by [`SlotId`], so every
//! recency structure in the crate gets stable handles and O(1) splice/move
//! operations without aliased mutable references or raw pointers.
//!
//! ```text
//!   head ─► [id_1] ◄──► [id_2] ◄──► [id_3] ◄── tail
//!            MRU                      LRU
//! ```
//!
//! ## Operations
//! - `push_front` / `push_back` / `pop_front` / `pop_back`: O(1)
//! - `move_to_front(id)`: detach + attach at head, O(1)
//! - `remove(id)`: detach + free, O(1)
//! - `iter`: front to back, O(n)

use crate::ds::slot_arena::{SlotArena, SlotId};

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// Intrusive doubly linked list addressed by [`SlotId`].
#[derive(Debug)]
pub struct IntrusiveList<T> {
    arena: SlotArena<Node<T>>,
    head: Option<SlotId>,
    tail: Option<SlotId>,
}

impl<T> Default for IntrusiveList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntrusiveList<T> {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self {
            arena: SlotArena::new(),
            head: None,
            tail: None,
        }
    }

    /// Creates an empty list with reserved node capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: SlotArena::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns `true` if the list has no nodes.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Returns `true` if `id` is a live node of this list.
    pub fn contains(&self, id: SlotId) -> bool {
        self.arena.contains(id)
    }

    /// Returns the value at the front, if any.
    pub fn front(&self) -> Option<&T> {
        self.head.and_then(|id| self.get(id))
    }

    /// Returns the value at the back, if any.
    pub fn back(&self) -> Option<&T> {
        self.tail.and_then(|id| self.get(id))
    }

    /// Returns the value for a node id.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.arena.get(id).map(|node| &node.value)
    }

    /// Inserts a value at the front, returning its id.
    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            prev: None,
            next: self.head,
        });
        match self.head {
            Some(old_head) => {
                if let Some(node) = self.arena.get_mut(old_head) {
                    node.prev = Some(id);
                }
            },
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        id
    }

    /// Inserts a value at the back, returning its id.
    pub fn push_back(&mut self, value: T) -> SlotId {
        let id = self.arena.insert(Node {
            value,
            prev: self.tail,
            next: None,
        });
        match self.tail {
            Some(old_tail) => {
                if let Some(node) = self.arena.get_mut(old_tail) {
                    node.next = Some(id);
                }
            },
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        id
    }

    /// Removes and returns the front value.
    pub fn pop_front(&mut self) -> Option<T> {
        let id = self.head?;
        self.remove(id)
    }

    /// Removes and returns the back value.
    pub fn pop_back(&mut self) -> Option<T> {
        let id = self.tail?;
        self.remove(id)
    }

    /// Moves a node to the front. Returns `false` if the id is stale.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        if !self.arena.contains(id) {
            return false;
        }
        if self.head == Some(id) {
            return true;
        }
        self.detach(id);
        // Reattach at head.
        let old_head = self.head;
        if let Some(node) = self.arena.get_mut(id) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            if let Some(node) = self.arena.get_mut(h) {
                node.prev = Some(id);
            }
        } else {
            self.tail = Some(id);
        }
        self.head = Some(id);
        true
    }

    /// Removes a node by id, returning its value.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.arena.contains(id) {
            return None;
        }
        self.detach(id);
        self.arena.remove(id).map(|node| node.value)
    }

    /// Drops all nodes.
    pub fn clear(&mut self) {
        self.arena.clear();
        self.head = None;
        self.tail = None;
    }

    /// Returns an iterator over values, front to back.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            current: self.head,
        }
    }

    /// Unlinks a node from its neighbors without freeing it.
    fn detach(&mut self, id: SlotId) {
        let (prev, next) = match self.arena.get(id) {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.arena.get_mut(p) {
                    node.next = next;
                }
            },
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.arena.get_mut(n) {
                    node.prev = prev;
                }
            },
            None => self.tail = prev,
        }
    }
}

/// Front-to-back iterator over an [`IntrusiveList`].
pub struct Iter<'a, T> {
    list: &'a IntrusiveList<T>,
    current: Option<SlotId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.current?;
        let node = self.list.arena.get(id)?;
        self.current = node.next;
        Some(&node.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect<T: Clone>(list: &IntrusiveList<T>) -> Vec<T> {
        list.iter().cloned().collect()
    }

    #[test]
    fn push_and_pop_both_ends() {
        let mut list = IntrusiveList::new();
        list.push_back(2);
        list.push_front(1);
        list.push_back(3);
        assert_eq!(collect(&list), vec![1, 2, 3]);
        assert_eq!(list.pop_front(), Some(1));
        assert_eq!(list.pop_back(), Some(3));
        assert_eq!(list.pop_back(), Some(2));
        assert_eq!(list.pop_back(), None);
        assert!(list.is_empty());
    }

    #[test]
    fn move_to_front_reorders() {
        let mut list = IntrusiveList::new();
        let a = list.push_front("a");
        let _b = list.push_front("b");
        let _c = list.push_front("c");
        assert_eq!(collect(&list), vec!["c", "b", "a"]);

        assert!(list.move_to_front(a));
        assert_eq!(collect(&list), vec!["a", "c", "b"]);
        assert_eq!(list.back(), Some(&"b"));
    }

    #[test]
    fn move_to_front_of_head_is_noop() {
        let mut list = IntrusiveList::new();
        list.push_front(1);
        let head = list.push_front(2);
        assert!(list.move_to_front(head));
        assert_eq!(collect(&list), vec![2, 1]);
    }

    #[test]
    fn remove_middle_relinks_neighbors() {
        let mut list = IntrusiveList::new();
        let _a = list.push_back("a");
        let b = list.push_back("b");
        let _c = list.push_back("c");

        assert_eq!(list.remove(b), Some("b"));
        assert_eq!(collect(&list), vec!["a", "c"]);
        // Stale id is rejected.
        assert_eq!(list.remove(b), None);
        assert!(!list.move_to_front(b));
    }

    #[test]
    fn single_node_remove_resets_both_ends() {
        let mut list = IntrusiveList::new();
        let a = list.push_front(7);
        assert_eq!(list.remove(a), Some(7));
        assert_eq!(list.front(), None);
        assert_eq!(list.back(), None);
        list.push_back(8);
        assert_eq!(collect(&list), vec![8]);
    }
}
