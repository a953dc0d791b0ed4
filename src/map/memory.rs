//! In-memory reference implementation of [`CacheMap`].
//!
//! Three `FxHashMap` tables behind one normalized-key identity. Not
//! thread-safe on its own; the orchestrator wraps it in a lock and never
//! holds that lock across a suspension point.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ MemoryCacheMap<V>                                        │
//!   │                                                          │
//!   │  items:   FxHashMap<NormalizedKey, StoredItem<V>>        │
//!   │  meta:    FxHashMap<NormalizedKey, EntryMeta>            │
//!   │  queries: FxHashMap<QueryFingerprint, QueryResultEntry>  │
//!   │                                                          │
//!   │  bytes: running sum of estimated item sizes              │
//!   │  limits: configured SizeLimits (enforced by the          │
//!   │          EvictionManager, reported here)                 │
//!   └──────────────────────────────────────────────────────────┘
//! ```

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::key::{scope_eq, ItemKey, LocationRef, NormalizedKey};
use crate::map::traits::{CacheMap, CacheSize, EntryMeta, SizeLimits};
use crate::query::{Query, QueryFingerprint};
use crate::query_cache::QueryResultEntry;

#[derive(Debug, Clone)]
struct StoredItem<V> {
    key: ItemKey,
    value: V,
}

/// Reference in-memory storage backend.
#[derive(Debug)]
pub struct MemoryCacheMap<V> {
    items: FxHashMap<NormalizedKey, StoredItem<V>>,
    meta: FxHashMap<NormalizedKey, EntryMeta>,
    queries: FxHashMap<QueryFingerprint, QueryResultEntry>,
    bytes: u64,
    limits: SizeLimits,
}

impl<V> Default for MemoryCacheMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryCacheMap<V> {
    /// Creates an empty, unbounded map.
    pub fn new() -> Self {
        Self::with_limits(SizeLimits::default())
    }

    /// Creates an empty map reporting the given limits.
    pub fn with_limits(limits: SizeLimits) -> Self {
        Self {
            items: FxHashMap::default(),
            meta: FxHashMap::default(),
            queries: FxHashMap::default(),
            bytes: 0,
            limits,
        }
    }

    fn remove_item(&mut self, nk: &NormalizedKey) -> bool {
        let existed = self.items.remove(nk).is_some();
        if let Some(meta) = self.meta.remove(nk) {
            self.bytes = self.bytes.saturating_sub(meta.estimated_size);
        }
        existed
    }
}

impl<V: Clone + Serialize> CacheMap<V> for MemoryCacheMap<V> {
    fn get(&mut self, key: &ItemKey) -> Option<V> {
        let nk = key.normalize();
        let value = self.items.get(&nk).map(|item| item.value.clone())?;
        if let Some(meta) = self.meta.get_mut(&nk) {
            meta.record_access();
        }
        Some(value)
    }

    fn peek(&self, key: &ItemKey) -> Option<&V> {
        self.items.get(&key.normalize()).map(|item| &item.value)
    }

    fn set(&mut self, key: &ItemKey, value: V, estimated_size: u64) {
        let nk = key.normalize();
        if let Some(old) = self.meta.get(&nk) {
            self.bytes = self.bytes.saturating_sub(old.estimated_size);
        }
        self.bytes += estimated_size;
        self.items.insert(
            nk.clone(),
            StoredItem {
                key: key.clone(),
                value,
            },
        );
        self.meta.insert(nk, EntryMeta::new(estimated_size));
    }

    fn delete(&mut self, key: &ItemKey) -> bool {
        let nk = key.normalize();
        let existed = self.remove_item(&nk);
        // Surgical fixup: shrink referencing entries, drop ones that
        // emptied out. Entries that were already empty (cached empty
        // results) are left alone.
        self.queries
            .retain(|_, entry| !(entry.remove_key(&nk) && entry.is_empty()));
        existed
    }

    fn discard(&mut self, key: &ItemKey) -> bool {
        self.remove_item(&key.normalize())
    }

    fn includes_key(&self, key: &ItemKey) -> bool {
        self.items.contains_key(&key.normalize())
    }

    fn keys(&self) -> Vec<ItemKey> {
        self.items.values().map(|item| item.key.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.items.values().map(|item| item.value.clone()).collect()
    }

    fn clear(&mut self) {
        self.items.clear();
        self.meta.clear();
        self.queries.clear();
        self.bytes = 0;
    }

    fn all_in(&self, locations: &[LocationRef]) -> Vec<(ItemKey, V)> {
        self.items
            .values()
            .filter(|item| scope_eq(item.key.location(), locations))
            .map(|item| (item.key.clone(), item.value.clone()))
            .collect()
    }

    fn contains(&self, query: &Query, locations: &[LocationRef]) -> bool {
        self.items
            .values()
            .any(|item| scope_eq(item.key.location(), locations) && query.matches(&item.value))
    }

    fn query_in(&self, query: &Query, locations: &[LocationRef]) -> Vec<(ItemKey, V)> {
        self.items
            .values()
            .filter(|item| scope_eq(item.key.location(), locations) && query.matches(&item.value))
            .map(|item| (item.key.clone(), item.value.clone()))
            .collect()
    }

    fn meta(&self, key: &ItemKey) -> Option<EntryMeta> {
        self.meta.get(&key.normalize()).cloned()
    }

    fn set_meta(&mut self, key: &ItemKey, meta: EntryMeta) {
        let nk = key.normalize();
        if let Some(old) = self.meta.get(&nk) {
            self.bytes = self.bytes.saturating_sub(old.estimated_size);
        }
        self.bytes += meta.estimated_size;
        self.meta.insert(nk, meta);
    }

    fn delete_meta(&mut self, key: &ItemKey) {
        if let Some(meta) = self.meta.remove(&key.normalize()) {
            self.bytes = self.bytes.saturating_sub(meta.estimated_size);
        }
    }

    fn all_meta(&self) -> Vec<(ItemKey, EntryMeta)> {
        self.meta
            .iter()
            .filter_map(|(nk, meta)| {
                let key = self.items.get(nk).map(|item| item.key.clone())?;
                Some((key, meta.clone()))
            })
            .collect()
    }

    fn clear_meta(&mut self) {
        self.meta.clear();
        self.bytes = 0;
    }

    fn set_query_result(&mut self, fp: QueryFingerprint, entry: QueryResultEntry) {
        self.queries.insert(fp, entry);
    }

    fn query_result(&self, fp: &QueryFingerprint) -> Option<&QueryResultEntry> {
        self.queries.get(fp)
    }

    fn has_query_result(&self, fp: &QueryFingerprint) -> bool {
        self.queries.contains_key(fp)
    }

    fn delete_query_result(&mut self, fp: &QueryFingerprint) -> bool {
        self.queries.remove(fp).is_some()
    }

    fn clear_query_results(&mut self) {
        self.queries.clear();
    }

    fn query_results(&self) -> Vec<(QueryFingerprint, QueryResultEntry)> {
        self.queries
            .iter()
            .map(|(fp, entry)| (fp.clone(), entry.clone()))
            .collect()
    }

    fn invalidate_item_keys(&mut self, keys: &[ItemKey]) -> usize {
        let normalized: Vec<NormalizedKey> = keys.iter().map(ItemKey::normalize).collect();
        let mut removed = 0;
        for nk in &normalized {
            if self.remove_item(nk) {
                removed += 1;
            }
        }
        // Whole referencing entries are dropped, never filtered: the
        // mutation's full blast radius is not locally knowable.
        self.queries.retain(|_, entry| !entry.references_any(&normalized));
        removed
    }

    fn invalidate_location(&mut self, locations: &[LocationRef]) -> usize {
        let doomed: Vec<NormalizedKey> = self
            .items
            .iter()
            .filter(|(_, item)| {
                if locations.is_empty() {
                    item.key.location().is_empty()
                } else {
                    scope_eq(item.key.location(), locations)
                }
            })
            .map(|(nk, _)| nk.clone())
            .collect();
        let mut removed = 0;
        for nk in &doomed {
            if self.remove_item(nk) {
                removed += 1;
            }
        }
        self.queries.clear();
        removed
    }

    fn current_size(&self) -> CacheSize {
        CacheSize {
            items: self.items.len(),
            bytes: self.bytes,
        }
    }

    fn size_limits(&self) -> SizeLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Facet;
    use serde_json::{json, Value};

    fn map() -> MemoryCacheMap<Value> {
        MemoryCacheMap::new()
    }

    fn k(id: i64) -> ItemKey {
        ItemKey::primary("task", id)
    }

    fn scoped(id: i64, board: i64) -> ItemKey {
        ItemKey::composite("task", id, vec![LocationRef::new("board", board)])
    }

    fn fp(tag: &str) -> QueryFingerprint {
        QueryFingerprint::compute("task", &Query::new(), &[], &Facet::Named(tag.into()))
    }

    #[test]
    fn set_get_normalizes_key_identity() {
        let mut m = map();
        m.set(&k(1), json!({"n": 1}), 10);
        // String id form addresses the same entry.
        assert_eq!(m.get(&ItemKey::primary("task", "1")), Some(json!({"n": 1})));
        assert!(m.includes_key(&ItemKey::primary("task", "1")));
    }

    #[test]
    fn get_records_access_peek_does_not() {
        let mut m = map();
        m.set(&k(1), json!(1), 10);
        assert_eq!(m.meta(&k(1)).unwrap().access_count, 1);
        m.get(&k(1));
        assert_eq!(m.meta(&k(1)).unwrap().access_count, 2);
        m.peek(&k(1));
        assert_eq!(m.meta(&k(1)).unwrap().access_count, 2);
    }

    #[test]
    fn set_replaces_size_accounting() {
        let mut m = map();
        m.set(&k(1), json!(1), 100);
        m.set(&k(1), json!(2), 40);
        assert_eq!(m.current_size(), CacheSize { items: 1, bytes: 40 });
        m.discard(&k(1));
        assert_eq!(m.current_size(), CacheSize::default());
    }

    #[test]
    fn all_in_separates_primary_from_scoped() {
        let mut m = map();
        m.set(&k(1), json!(1), 1);
        m.set(&scoped(2, 7), json!(2), 1);
        m.set(&scoped(3, 8), json!(3), 1);

        let primary = m.all_in(&[]);
        assert_eq!(primary.len(), 1);
        assert_eq!(primary[0].0, k(1));

        let board7 = m.all_in(&[LocationRef::new("board", "7")]);
        assert_eq!(board7.len(), 1);
        assert_eq!(board7[0].0, scoped(2, 7));
    }

    #[test]
    fn query_in_filters_by_predicate() {
        let mut m = map();
        m.set(&k(1), json!({"status": "open"}), 1);
        m.set(&k(2), json!({"status": "done"}), 1);
        let q = Query::new().field("status", json!("open"));
        assert!(m.contains(&q, &[]));
        let hits = m.query_in(&q, &[]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, k(1));
        assert!(!m.contains(&q, &[LocationRef::new("board", 1)]));
    }

    #[test]
    fn targeted_delete_shrinks_query_entries() {
        let mut m = map();
        m.set(&k(1), json!(1), 1);
        m.set(&k(2), json!(2), 1);
        let entry = QueryResultEntry::new("task", vec![], vec![k(1), k(2)], true);
        m.set_query_result(fp("q"), entry);

        m.delete(&k(1));
        let entry = m.query_result(&fp("q")).unwrap();
        assert_eq!(entry.keys(), &[k(2)]);

        // Deleting the last referenced key drops the entry entirely.
        m.delete(&k(2));
        assert!(!m.has_query_result(&fp("q")));
    }

    #[test]
    fn discard_leaves_query_entries_intact() {
        let mut m = map();
        m.set(&k(1), json!(1), 1);
        let entry = QueryResultEntry::new("task", vec![], vec![k(1), k(2)], true);
        m.set_query_result(fp("q"), entry);

        m.discard(&k(1));
        // Entry untouched; resolution is responsible for noticing.
        assert_eq!(m.query_result(&fp("q")).unwrap().len(), 2);
    }

    #[test]
    fn bulk_invalidation_drops_whole_entries() {
        let mut m = map();
        m.set(&k(1), json!(1), 1);
        m.set(&k(2), json!(2), 1);
        m.set_query_result(
            fp("with_1"),
            QueryResultEntry::new("task", vec![], vec![k(1), k(2)], true),
        );
        m.set_query_result(
            fp("without_1"),
            QueryResultEntry::new("task", vec![], vec![k(2)], false),
        );

        assert_eq!(m.invalidate_item_keys(&[k(1)]), 1);
        assert!(!m.has_query_result(&fp("with_1")));
        assert!(m.has_query_result(&fp("without_1")));
        assert!(!m.includes_key(&k(1)));
        assert!(m.includes_key(&k(2)));
    }

    #[test]
    fn invalidate_location_empty_scope_removes_primaries_only() {
        let mut m = map();
        m.set(&k(1), json!(1), 1);
        m.set(&scoped(2, 7), json!(2), 1);
        m.set_query_result(
            fp("q"),
            QueryResultEntry::new("task", vec![], vec![k(1)], true),
        );

        assert_eq!(m.invalidate_location(&[]), 1);
        assert!(!m.includes_key(&k(1)));
        assert!(m.includes_key(&scoped(2, 7)));
        // Query table cleared wholesale.
        assert!(!m.has_query_result(&fp("q")));
    }

    #[test]
    fn invalidate_location_matches_exact_chain_only() {
        let mut m = map();
        let nested = ItemKey::composite(
            "task",
            1,
            vec![LocationRef::new("board", 7), LocationRef::new("lane", 2)],
        );
        m.set(&scoped(2, 7), json!(2), 1);
        m.set(&nested, json!(1), 1);

        // No prefix matching: only the exact [board:7] chain goes.
        assert_eq!(m.invalidate_location(&[LocationRef::new("board", 7)]), 1);
        assert!(!m.includes_key(&scoped(2, 7)));
        assert!(m.includes_key(&nested));
    }
}
