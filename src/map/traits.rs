//! The storage contract for cache backends.
//!
//! A [`CacheMap`] owns three tables keyed by normalized identity:
//!
//! ```text
//!   items:    NormalizedKey ─► value
//!   meta:     NormalizedKey ─► EntryMeta (added_at, last_accessed_at, ...)
//!   queries:  QueryFingerprint ─► QueryResultEntry (keys + completeness)
//! ```
//!
//! ## Removal semantics (three distinct paths)
//!
//! | Path | Item table | Query table |
//! |------|-----------|-------------|
//! | [`delete`](CacheMap::delete) (targeted) | removed | key surgically removed from each referencing entry; emptied entries dropped |
//! | [`discard`](CacheMap::discard) (evict/expire) | removed | untouched; resolution notices the missing key and drops the entry |
//! | [`invalidate_item_keys`](CacheMap::invalidate_item_keys) / [`invalidate_location`](CacheMap::invalidate_location) (bulk) | removed | whole referencing entries dropped |
//!
//! `discard` must never shrink a query entry's key list: a complete result
//! minus an evicted member would silently present a partial result as
//! complete. Bulk invalidation drops whole entries because the mutation's
//! full blast radius is not locally knowable, so partial reconciliation is
//! not attempted.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::key::{ItemKey, LocationRef};
use crate::query::{Query, QueryFingerprint};
use crate::query_cache::QueryResultEntry;

/// Fixed per-entry bookkeeping overhead added to size estimates.
const ENTRY_OVERHEAD: usize = 48;

/// Estimates an item's in-cache footprint from its serialized length.
///
/// Falls back to the bare overhead plus a nominal value size when the value
/// does not serialize.
pub fn estimated_size_of<V: Serialize>(value: &V) -> u64 {
    match serde_json::to_vec(value) {
        Ok(bytes) => (bytes.len() + ENTRY_OVERHEAD) as u64,
        Err(_) => (ENTRY_OVERHEAD + 64) as u64,
    }
}

/// Per-item bookkeeping, created on first successful write and destroyed on
/// delete, eviction, expiry, or clear.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    /// When the entry was (last) written.
    pub added_at: Instant,
    /// When the entry was last read or written.
    pub last_accessed_at: Instant,
    /// Number of reads and writes observed.
    pub access_count: u64,
    /// Estimated footprint in bytes.
    pub estimated_size: u64,
    /// Per-item TTL override; takes precedence over the cache default.
    pub ttl_override: Option<Duration>,
}

impl EntryMeta {
    /// Creates metadata for a freshly written entry.
    pub fn new(estimated_size: u64) -> Self {
        let now = Instant::now();
        Self {
            added_at: now,
            last_accessed_at: now,
            access_count: 1,
            estimated_size,
            ttl_override: None,
        }
    }

    /// Records a read.
    pub fn record_access(&mut self) {
        self.last_accessed_at = Instant::now();
        self.access_count += 1;
    }
}

/// Snapshot of a map's current occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheSize {
    /// Number of stored items.
    pub items: usize,
    /// Sum of estimated item sizes.
    pub bytes: u64,
}

/// Configured capacity limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeLimits {
    /// Maximum item count, if bounded.
    pub max_items: Option<usize>,
    /// Maximum total bytes, if bounded.
    pub max_bytes: Option<u64>,
}

/// Storage-agnostic contract for cache backends.
///
/// All lookups normalize their key before comparing, so numeric and string
/// id forms address the same entry. Implementations are synchronous and
/// non-blocking; callers provide any cross-thread synchronization.
pub trait CacheMap<V: Clone + Serialize> {
    // -- item storage -----------------------------------------------------

    /// Returns the value for a key, recording the access in its metadata.
    fn get(&mut self, key: &ItemKey) -> Option<V>;

    /// Returns the value for a key without touching metadata.
    fn peek(&self, key: &ItemKey) -> Option<&V>;

    /// Writes a value, creating or replacing its metadata with the given
    /// estimated size.
    fn set(&mut self, key: &ItemKey, value: V, estimated_size: u64);

    /// Targeted delete: removes the item and surgically removes its key from
    /// every referencing query entry (dropping entries that become empty).
    /// Returns `true` if the item existed.
    fn delete(&mut self, key: &ItemKey) -> bool;

    /// Physical removal for eviction/expiry: removes the item and metadata
    /// but leaves the query table untouched.
    fn discard(&mut self, key: &ItemKey) -> bool;

    /// Returns `true` if the key is stored.
    fn includes_key(&self, key: &ItemKey) -> bool;

    /// Returns all stored keys.
    fn keys(&self) -> Vec<ItemKey>;

    /// Returns all stored values.
    fn values(&self) -> Vec<V>;

    /// Drops all items, metadata, and query results.
    fn clear(&mut self);

    // -- scoped iteration -------------------------------------------------

    /// Returns all items whose location chain exactly equals `locations`.
    /// An empty scope selects every Primary-keyed item.
    fn all_in(&self, locations: &[LocationRef]) -> Vec<(ItemKey, V)>;

    /// Returns `true` if any item in the scope matches the predicate.
    fn contains(&self, query: &Query, locations: &[LocationRef]) -> bool;

    /// Linear scan: all items in the scope matching the predicate. Only
    /// valid where completeness is separately guaranteed by the caller.
    fn query_in(&self, query: &Query, locations: &[LocationRef]) -> Vec<(ItemKey, V)>;

    // -- metadata ---------------------------------------------------------

    /// Returns a copy of the metadata for a key.
    fn meta(&self, key: &ItemKey) -> Option<EntryMeta>;

    /// Writes metadata for a key.
    fn set_meta(&mut self, key: &ItemKey, meta: EntryMeta);

    /// Removes metadata for a key.
    fn delete_meta(&mut self, key: &ItemKey);

    /// Returns all metadata entries.
    fn all_meta(&self) -> Vec<(ItemKey, EntryMeta)>;

    /// Drops all metadata.
    fn clear_meta(&mut self);

    // -- query results ----------------------------------------------------

    /// Stores a query result under its fingerprint.
    fn set_query_result(&mut self, fp: QueryFingerprint, entry: QueryResultEntry);

    /// Returns the result entry for a fingerprint.
    fn query_result(&self, fp: &QueryFingerprint) -> Option<&QueryResultEntry>;

    /// Returns `true` if a result is stored for the fingerprint.
    fn has_query_result(&self, fp: &QueryFingerprint) -> bool;

    /// Removes the result for a fingerprint. Returns `true` if present.
    fn delete_query_result(&mut self, fp: &QueryFingerprint) -> bool;

    /// Drops every stored query result.
    fn clear_query_results(&mut self);

    /// Returns all stored fingerprints and entries.
    fn query_results(&self) -> Vec<(QueryFingerprint, QueryResultEntry)>;

    // -- bulk invalidation ------------------------------------------------

    /// Bulk invalidation: removes the given items and drops every query
    /// entry referencing any of them (no surgical filtering). Returns the
    /// number of items removed.
    fn invalidate_item_keys(&mut self, keys: &[ItemKey]) -> usize;

    /// Bulk invalidation by scope: an empty scope removes all Primary-keyed
    /// items; a non-empty scope removes Composite items whose chain is
    /// exactly equal (no prefix matching). Clears the entire query-result
    /// table as a conservative measure. Returns the number of items removed.
    fn invalidate_location(&mut self, locations: &[LocationRef]) -> usize;

    // -- sizing -----------------------------------------------------------

    /// Current occupancy.
    fn current_size(&self) -> CacheSize;

    /// Configured limits.
    fn size_limits(&self) -> SizeLimits;
}
