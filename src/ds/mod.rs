//! Internal data structures shared by eviction policies.
//!
//! - [`SlotArena`] / [`SlotId`]: generational arena giving stable handles
//!   without pointer aliasing.
//! - [`IntrusiveList`]: doubly linked list over arena slots with O(1)
//!   detach/reattach, used for every recency ordering in the crate.
//! - [`RecencyList`]: keyed LRU ordering (list + index), optionally bounded;
//!   the bounded form is the ghost list used by adaptive policies.
//! - [`CountMinSketch`]: approximate frequency counting with multiplicative
//!   decay, used by the LFU policy.

pub mod intrusive_list;
pub mod recency_list;
pub mod sketch;
pub mod slot_arena;

pub use intrusive_list::IntrusiveList;
pub use recency_list::RecencyList;
pub use sketch::CountMinSketch;
pub use slot_arena::{SlotArena, SlotId};
