//! Generational slot arena.
//!
//! Stores values in a `Vec` of slots addressed by [`SlotId`] (index +
//! generation). Freed slots go on a free list and are reused with a bumped
//! generation, so a stale id held after removal can never observe the slot's
//! next occupant.
//!
//! ## Behavior
//! - `insert`: O(1), reuses a free slot when available
//! - `get` / `get_mut` / `remove`: O(1), generation-checked
//! - `clear`: drops all values, invalidates all outstanding ids

/// Stable handle into a [`SlotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied { generation: u32, value: T },
    Free { generation: u32, next_free: Option<u32> },
}

/// Arena of values addressed by generational [`SlotId`]s.
#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotArena<T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Creates an empty arena with reserved capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a value, returning its handle.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.len += 1;
        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            let (generation, next_free) = match slot {
                Slot::Free {
                    generation,
                    next_free,
                } => (*generation, *next_free),
                Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
            };
            self.free_head = next_free;
            *slot = Slot::Occupied { generation, value };
            SlotId { index, generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied {
                generation: 0,
                value,
            });
            SlotId {
                index,
                generation: 0,
            }
        }
    }

    /// Returns a reference to the value for `id`, if still occupied.
    pub fn get(&self, id: SlotId) -> Option<&T> {
        match self.slots.get(id.index as usize) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            },
            _ => None,
        }
    }

    /// Returns a mutable reference to the value for `id`, if still occupied.
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        match self.slots.get_mut(id.index as usize) {
            Some(Slot::Occupied { generation, value }) if *generation == id.generation => {
                Some(value)
            },
            _ => None,
        }
    }

    /// Returns `true` if `id` refers to a live value.
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Removes and returns the value for `id`.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slots.get_mut(id.index as usize)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == id.generation => {
                let next_generation = generation.wrapping_add(1);
                let old = std::mem::replace(
                    slot,
                    Slot::Free {
                        generation: next_generation,
                        next_free: self.free_head,
                    },
                );
                self.free_head = Some(id.index);
                self.len -= 1;
                match old {
                    Slot::Occupied { value, .. } => Some(value),
                    Slot::Free { .. } => unreachable!(),
                }
            },
            _ => None,
        }
    }

    /// Drops all values and invalidates every outstanding id.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_get_remove_round_trip() {
        let mut arena = SlotArena::new();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get(a), Some(&"a"));
        assert_eq!(arena.remove(b), Some("b"));
        assert_eq!(arena.get(b), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn stale_id_cannot_see_reused_slot() {
        let mut arena = SlotArena::new();
        let a = arena.insert(1);
        arena.remove(a);
        let b = arena.insert(2);
        // b reuses a's slot with a new generation.
        assert_eq!(b.index, a.index);
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.remove(a), None);
        assert_eq!(arena.get(b), Some(&2));
    }

    #[test]
    fn clear_invalidates_everything() {
        let mut arena = SlotArena::new();
        let a = arena.insert(1);
        arena.clear();
        assert!(arena.is_empty());
        assert_eq!(arena.get(a), None);
    }
}
