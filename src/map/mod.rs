//! Storage layer: the [`CacheMap`] contract and its in-memory reference
//! implementation.
//!
//! Policies and orchestrators never touch a concrete container; they speak
//! the [`CacheMap`] contract, which bundles item storage, per-item metadata,
//! and the query-result table behind one normalized-key identity.

pub mod memory;
pub mod traits;

pub use memory::MemoryCacheMap;
pub use traits::{estimated_size_of, CacheMap, CacheSize, EntryMeta, SizeLimits};
