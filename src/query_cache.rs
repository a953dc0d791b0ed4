//! Query-result entries and their resolution against item storage.
//!
//! A query result never stores values. It stores the ordered list of item
//! keys the query produced, plus a completeness marker, under the query's
//! fingerprint. Resolution re-fetches each key from the item store, which is
//! what makes invalidation transparent: evicting, expiring, or invalidating
//! any single item silently breaks every query result that referenced it:
//! the next resolution finds a key missing, drops the entry, and reports a
//! miss.
//!
//! ```text
//!   fingerprint ─► QueryResultEntry { keys: [k1, k2, k3], complete: true }
//!                         │ resolve()
//!                         ▼
//!        k1 ─► hit    k2 ─► hit    k3 ─► MISSING
//!                         │
//!                         ▼
//!        entry dropped, query treated as a cache miss
//! ```

use serde::Serialize;

use crate::key::{scope_eq, ItemKey, LocationRef, NormalizedKey};
use crate::map::CacheMap;
use crate::ttl::TtlManager;

/// Stored outcome of a query: ordered item keys plus completeness.
#[derive(Debug, Clone)]
pub struct QueryResultEntry {
    keys: Vec<ItemKey>,
    normalized: Vec<NormalizedKey>,
    complete: bool,
    kind: String,
    scope: Vec<LocationRef>,
}

impl QueryResultEntry {
    /// Creates an entry for a query over `kind` scoped to `scope`.
    ///
    /// `complete` marks a full, unfiltered enumeration; partial/faceted
    /// results must pass `false`.
    pub fn new(kind: impl Into<String>, scope: Vec<LocationRef>, keys: Vec<ItemKey>, complete: bool) -> Self {
        let normalized = keys.iter().map(ItemKey::normalize).collect();
        Self {
            keys,
            normalized,
            complete,
            kind: kind.into(),
            scope,
        }
    }

    /// The ordered item keys this result references.
    pub fn keys(&self) -> &[ItemKey] {
        &self.keys
    }

    /// `true` if this entry is a complete, unfiltered enumeration.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Item kind the query ran over.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Location scope the query ran over.
    pub fn scope(&self) -> &[LocationRef] {
        &self.scope
    }

    /// Number of referenced keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// `true` if no keys remain.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// `true` if the entry references the given normalized key.
    pub fn references(&self, key: &NormalizedKey) -> bool {
        self.normalized.iter().any(|n| n == key)
    }

    /// `true` if the entry references any of the given normalized keys.
    pub fn references_any(&self, keys: &[NormalizedKey]) -> bool {
        keys.iter().any(|k| self.references(k))
    }

    /// Surgically removes one key from the list (targeted delete path).
    /// Returns `true` if the key was present.
    pub fn remove_key(&mut self, key: &NormalizedKey) -> bool {
        let before = self.keys.len();
        let mut keys = Vec::with_capacity(before);
        let mut normalized = Vec::with_capacity(before);
        for (k, n) in self.keys.drain(..).zip(self.normalized.drain(..)) {
            if n != *key {
                keys.push(k);
                normalized.push(n);
            }
        }
        self.keys = keys;
        self.normalized = normalized;
        self.keys.len() != before
    }

    /// `true` if the entry is scoped to exactly this kind and location.
    pub fn scoped_to(&self, kind: &str, scope: &[LocationRef]) -> bool {
        self.kind == kind && scope_eq(&self.scope, scope)
    }
}

/// Re-fetches every referenced key from the item store.
///
/// Returns the resolved items in the entry's stored order, or `None` if any
/// key is missing or TTL-expired, in which case the caller must drop the
/// fingerprint entry and treat the query as a miss. An entry with no keys
/// resolves to an empty vec (cached negative result).
pub fn resolve<V, M>(map: &M, ttl: &TtlManager, entry: &QueryResultEntry) -> Option<Vec<(ItemKey, V)>>
where
    V: Clone + Serialize,
    M: CacheMap<V>,
{
    let mut out = Vec::with_capacity(entry.len());
    for key in entry.keys() {
        let value = map.peek(key)?;
        if !ttl.validate(key, map) {
            return None;
        }
        out.push((key.clone(), value.clone()));
    }
    Some(out)
}
