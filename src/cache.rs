//! Read-through cache orchestration.
//!
//! [`SourceCache`] composes the layers below it into the user-facing
//! operations:
//!
//! ```text
//!   get/all/one ──► validate ─► cache + TTL check ─► hit? return
//!                                    │ miss
//!                                    ▼
//!                         RequestCoordinator (single flight)
//!                                    │ leader only
//!                                    ▼
//!                     DataSource fetch ─► store + evict + notify
//!
//!   create/update/remove/action ──► upstream first, then targeted or
//!   bulk invalidation, then write-through of the returned value
//! ```
//!
//! Cache-local work is synchronous under one mutex; the only suspension
//! point is the upstream call, and the mutex is never held across it.
//! Events are collected under the lock and emitted after it is released,
//! so a listener can re-enter the cache.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::coordinator::RequestCoordinator;
use crate::error::CacheError;
use crate::eviction::EvictionManager;
use crate::events::{CacheEvent, CacheEventKind, EventReason, EventSink};
use crate::key::{ItemKey, LocationRef, NormalizedKey};
use crate::map::{estimated_size_of, CacheMap, CacheSize, MemoryCacheMap};
use crate::query::{Facet, Query, QueryFingerprint};
use crate::query_cache::{self, QueryResultEntry};
use crate::source::{DataSource, SourceItem};
use crate::ttl::TtlManager;

/// Counters exposed by [`SourceCache::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the cache.
    pub hits: u64,
    /// Reads that went upstream.
    pub misses: u64,
    /// Reads that joined an in-flight fetch led by another caller.
    pub coalesced: u64,
    /// Entries reclaimed by the eviction policy.
    pub evictions: u64,
    /// Entries dropped for outliving their TTL.
    pub expirations: u64,
    /// Current resident size.
    pub size: CacheSize,
}

struct CacheState<V, M> {
    map: M,
    eviction: EvictionManager,
    hits: u64,
    misses: u64,
    coalesced: u64,
    expirations: u64,
    _values: std::marker::PhantomData<V>,
}

/// Read-through cache over a [`DataSource`].
pub struct SourceCache<V, S, M = MemoryCacheMap<V>>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    state: Arc<Mutex<CacheState<V, M>>>,
    ttl: TtlManager,
    source: Arc<S>,
    events: Arc<dyn EventSink>,
    point_flights: RequestCoordinator<Option<V>>,
    query_flights: RequestCoordinator<Vec<SourceItem<V>>>,
    bypass: bool,
    maintenance_interval: Duration,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl<V, S, M> std::fmt::Debug for SourceCache<V, S, M>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCache")
            .field("bypass", &self.bypass)
            .field("maintenance_interval", &self.maintenance_interval)
            .finish_non_exhaustive()
    }
}

impl<V, S> SourceCache<V, S, MemoryCacheMap<V>>
where
    V: Clone + Serialize + Send + Sync + 'static,
    S: DataSource<V> + 'static,
{
    /// Creates a cache over the in-memory map with a null event sink.
    /// Fails if `config` does not validate under its own mode.
    pub fn new(source: S, config: CacheConfig) -> Result<Self, CacheError> {
        let config = config.validated()?;
        let map = MemoryCacheMap::with_limits(config.size_limits());
        Ok(Self::from_parts(
            source,
            config,
            map,
            Arc::new(crate::events::NullSink),
        ))
    }
}

impl<V, S, M> SourceCache<V, S, M>
where
    V: Clone + Serialize + Send + Sync + 'static,
    S: DataSource<V> + 'static,
    M: CacheMap<V> + Send + 'static,
{
    /// Assembles a cache from pre-validated parts. Used by the builder.
    pub(crate) fn from_parts(
        source: S,
        config: CacheConfig,
        map: M,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let eviction = EvictionManager::new(&config.policy, config.size_limits());
        Self {
            state: Arc::new(Mutex::new(CacheState {
                map,
                eviction,
                hits: 0,
                misses: 0,
                coalesced: 0,
                expirations: 0,
                _values: std::marker::PhantomData,
            })),
            ttl: TtlManager::new(config.ttl),
            source: Arc::new(source),
            events,
            point_flights: RequestCoordinator::new(),
            query_flights: RequestCoordinator::new(),
            bypass: config.bypass_cache,
            maintenance_interval: config.maintenance_interval,
            maintenance: Mutex::new(None),
        }
    }

    fn flush(&self, events: Vec<CacheEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    /// Point read: cache first, upstream on miss. Upstream absence is
    /// `Ok(None)` and is not cached.
    pub async fn get(&self, key: &ItemKey) -> Result<Option<V>, CacheError> {
        self.lookup(key, None).await
    }

    /// Point read with a per-call freshness bound that overrides both the
    /// entry TTL and the cache default. A zero `ttl` always misses, drops
    /// any stored entry for the key, and does not store the fetched value.
    pub async fn get_with_ttl(&self, key: &ItemKey, ttl: Duration) -> Result<Option<V>, CacheError> {
        self.lookup(key, Some(ttl)).await
    }

    async fn lookup(&self, key: &ItemKey, ttl: Option<Duration>) -> Result<Option<V>, CacheError> {
        key.validate()?;
        if self.bypass {
            return Ok(self.source.get(key).await?);
        }
        if let Some(value) = self.check_point(key, ttl, true) {
            return Ok(Some(value));
        }
        let store = !ttl.is_some_and(|t| t.is_zero());
        let flight_key = key.normalize().into_inner();
        let led = AtomicBool::new(false);
        let result = self
            .point_flights
            .run(&flight_key, || async {
                led.store(true, Ordering::Relaxed);
                // A previous flight may have stored the value between our
                // miss and taking leadership.
                if let Some(value) = self.check_point(key, ttl, true) {
                    return Ok(Some(value));
                }
                self.state.lock().misses += 1;
                tracing::trace!(key = flight_key.as_str(), "point miss, fetching upstream");
                let fetched = self.source.get(key).await?;
                if let Some(value) = &fetched {
                    if store {
                        let mut events = Vec::new();
                        let mut state = self.state.lock();
                        self.store_item(
                            &mut state,
                            key,
                            value.clone(),
                            CacheEventKind::ItemRetrieved,
                            EventReason::Fetched,
                            &mut events,
                        );
                        drop(state);
                        self.flush(events);
                    }
                }
                Ok(fetched)
            })
            .await;
        if !led.load(Ordering::Relaxed) {
            self.state.lock().coalesced += 1;
        }
        result
    }

    /// Cache-side half of a point read: TTL check, eager expiry, access
    /// bookkeeping. `count` gates the hit counter; misses are settled at
    /// the flight leader, so coalesced waiters never inflate them.
    fn check_point(&self, key: &ItemKey, ttl: Option<Duration>, count: bool) -> Option<V> {
        let mut events = Vec::new();
        let value = {
            let mut state = self.state.lock();
            let live = match (state.map.meta(key), ttl) {
                (None, _) => state.map.includes_key(key),
                (Some(meta), Some(ttl)) => self.ttl.validate_with(&meta, ttl),
                (Some(meta), None) => !self.ttl.info(&meta).is_expired,
            };
            if !live && state.map.includes_key(key) {
                self.expire(&mut state, key, &mut events);
            }
            let value = if live { state.map.get(key) } else { None };
            if value.is_some() {
                state.eviction.record_access(key);
            }
            if count && value.is_some() {
                state.hits += 1;
                tracing::trace!(key = key.normalize().as_str(), "point hit");
            }
            value
        };
        self.flush(events);
        value
    }

    fn expire(&self, state: &mut CacheState<V, M>, key: &ItemKey, events: &mut Vec<CacheEvent>) {
        state.map.discard(key);
        state.eviction.record_remove(key);
        state.expirations += 1;
        tracing::trace!(key = key.normalize().as_str(), "expired entry dropped");
        events.push(CacheEvent::item(
            CacheEventKind::ItemRemoved,
            key.clone(),
            EventReason::Expired,
        ));
    }

    /// Stores one item: evicts for room, writes value and metadata, and
    /// queues the matching events.
    fn store_item(
        &self,
        state: &mut CacheState<V, M>,
        key: &ItemKey,
        value: V,
        kind: CacheEventKind,
        reason: EventReason,
        events: &mut Vec<CacheEvent>,
    ) {
        let size = estimated_size_of(&value);
        for victim in state.eviction.record_insert(key, size) {
            state.map.discard(&victim);
            events.push(CacheEvent::item(
                CacheEventKind::ItemRemoved,
                victim,
                EventReason::Evicted,
            ));
        }
        state.map.set(key, value, size);
        events.push(CacheEvent::item(kind, key.clone(), reason));
    }

    /// Complete or filtered enumeration of `kind` under `locations`.
    ///
    /// An empty `query` asks for the whole population and its result is
    /// recorded as complete (an empty upstream answer is cached as a
    /// complete empty result). A non-empty `query` is a partial view: it
    /// may be answered by scanning cached items, but only underneath a
    /// still-valid complete enumeration of the same kind and scope.
    pub async fn all(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Vec<V>, CacheError> {
        let items = self.enumerate(kind, query, locations, Facet::Complete).await?;
        Ok(items.into_iter().map(|(_, value)| value).collect())
    }

    /// Named partial view. Results are fingerprinted under `name` and are
    /// never treated as complete, so they can never satisfy [`all`].
    ///
    /// [`all`]: Self::all
    pub async fn view(
        &self,
        kind: &str,
        name: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Vec<V>, CacheError> {
        let facet = Facet::Named(name.to_owned());
        let items = self.enumerate(kind, query, locations, facet).await?;
        Ok(items.into_iter().map(|(_, value)| value).collect())
    }

    async fn enumerate(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
        facet: Facet,
    ) -> Result<Vec<(ItemKey, V)>, CacheError> {
        if self.bypass {
            let items = self.source.all(kind, query, locations).await?;
            return Ok(items.into_iter().map(|i| (i.key, i.value)).collect());
        }
        let complete = query.is_empty() && facet.is_complete();
        let fp = QueryFingerprint::compute(kind, query, locations, &facet);

        // Counters are settled here rather than in check_query so the scan
        // shortcut counts as a single hit, not a miss followed by a hit.
        if let Some(items) = self.check_query(&fp, false) {
            self.state.lock().hits += 1;
            tracing::debug!(%fp, kind, "query hit");
            return Ok(items);
        }
        if !complete {
            if let Some(items) = self.scan_under_complete(kind, query, locations, &fp, complete) {
                return Ok(items);
            }
        }

        let flight_key = fp.as_str().to_owned();
        let led = AtomicBool::new(false);
        let fetched = self
            .query_flights
            .run(&flight_key, || async {
                led.store(true, Ordering::Relaxed);
                self.state.lock().misses += 1;
                tracing::debug!(%fp, kind, "query miss, fetching upstream");
                let snapshot = self.resident_snapshot(locations);
                let fetched = self.source.all(kind, query, locations).await?;
                self.store_query(kind, locations, &fp, complete, &snapshot, &fetched);
                Ok(fetched)
            })
            .await;
        if !led.load(Ordering::Relaxed) {
            self.state.lock().coalesced += 1;
        }
        Ok(fetched?.into_iter().map(|i| (i.key, i.value)).collect())
    }

    /// Normalized keys currently resident in `locations`, taken before an
    /// upstream enumeration to split created from updated notifications.
    fn resident_snapshot(&self, locations: &[LocationRef]) -> FxHashSet<NormalizedKey> {
        let state = self.state.lock();
        state
            .map
            .all_in(locations)
            .into_iter()
            .map(|(key, _)| key.normalize())
            .collect()
    }

    /// Resolves a recorded query result, dropping it when any referenced
    /// key has vanished or expired. Expired members spotted during
    /// resolution are deleted on the spot, just like a point read would.
    fn check_query(&self, fp: &QueryFingerprint, count: bool) -> Option<Vec<(ItemKey, V)>> {
        let mut events = Vec::new();
        let resolved = {
            let mut state = self.state.lock();
            let entry = state.map.query_result(fp).cloned();
            let resolved = entry.and_then(|entry| {
                match query_cache::resolve(&state.map, &self.ttl, &entry) {
                    Some(items) => Some((entry, items)),
                    None => {
                        let mut expired = Vec::new();
                        for key in entry.keys() {
                            let stale = state
                                .map
                                .meta(key)
                                .is_some_and(|meta| self.ttl.info(&meta).is_expired);
                            if stale {
                                expired.push(key.clone());
                            }
                        }
                        for key in &expired {
                            self.expire(&mut state, key, &mut events);
                        }
                        state.map.delete_query_result(fp);
                        events.push(CacheEvent::query(
                            CacheEventKind::QueryInvalidated,
                            fp.clone(),
                            entry.scope().to_vec(),
                            EventReason::Invalidated,
                        ));
                        None
                    }
                }
            });
            if let Some((_, items)) = &resolved {
                for (key, _) in items {
                    state.map.get(key);
                    state.eviction.record_access(key);
                }
            }
            if count && resolved.is_some() {
                state.hits += 1;
            }
            resolved.map(|(_, items)| items)
        };
        self.flush(events);
        resolved
    }

    /// Filtered-query shortcut: answer from resident items, but only
    /// underneath a still-resolvable complete enumeration of the same kind
    /// and scope. Records the filtered result under its own fingerprint.
    fn scan_under_complete(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
        fp: &QueryFingerprint,
        complete: bool,
    ) -> Option<Vec<(ItemKey, V)>> {
        let mut state = self.state.lock();
        let umbrella = state
            .map
            .query_results()
            .into_iter()
            .find(|(_, entry)| entry.is_complete() && entry.scoped_to(kind, locations))?;
        let population = query_cache::resolve(&state.map, &self.ttl, &umbrella.1)?;
        let matched: Vec<(ItemKey, V)> = population
            .into_iter()
            .filter(|(_, value)| query.matches(value))
            .collect();
        let keys = matched.iter().map(|(key, _)| key.clone()).collect();
        state.map.set_query_result(
            fp.clone(),
            QueryResultEntry::new(kind, locations.to_vec(), keys, complete),
        );
        state.hits += 1;
        Some(matched)
    }

    /// Stores an enumeration result: for complete enumerations the target
    /// scope is invalidated first so vanished upstream items do not
    /// linger, then items are written and the fingerprint recorded.
    fn store_query(
        &self,
        kind: &str,
        locations: &[LocationRef],
        fp: &QueryFingerprint,
        complete: bool,
        snapshot: &FxHashSet<NormalizedKey>,
        fetched: &[SourceItem<V>],
    ) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            if complete {
                for key in state.map.all_in(locations).into_iter().map(|(key, _)| key) {
                    state.eviction.record_remove(&key);
                }
                state.map.invalidate_location(locations);
            }
            for item in fetched {
                let kind_event = if snapshot.contains(&item.key.normalize()) {
                    CacheEventKind::ItemUpdated
                } else {
                    CacheEventKind::ItemCreated
                };
                self.store_item(
                    &mut state,
                    &item.key,
                    item.value.clone(),
                    kind_event,
                    EventReason::Fetched,
                    &mut events,
                );
            }
            let keys = fetched.iter().map(|item| item.key.clone()).collect();
            state.map.set_query_result(
                fp.clone(),
                QueryResultEntry::new(kind, locations.to_vec(), keys, complete),
            );
            events.push(CacheEvent::query(
                CacheEventKind::QueryExecuted,
                fp.clone(),
                locations.to_vec(),
                EventReason::Fetched,
            ));
        }
        self.flush(events);
    }

    /// First item of `kind` matching `query`. Fingerprinted under its own
    /// facet so it can never collide with an enumeration; upstream absence
    /// is cached as an empty result.
    pub async fn one(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Option<V>, CacheError> {
        if self.bypass {
            return Ok(self.source.one(kind, query, locations).await?.map(|i| i.value));
        }
        let facet = Facet::Named("one".to_owned());
        let fp = QueryFingerprint::compute(kind, query, locations, &facet);
        if let Some(items) = self.check_query(&fp, true) {
            return Ok(items.into_iter().next().map(|(_, value)| value));
        }
        let flight_key = fp.as_str().to_owned();
        let led = AtomicBool::new(false);
        let fetched = self
            .query_flights
            .run(&flight_key, || async {
                led.store(true, Ordering::Relaxed);
                self.state.lock().misses += 1;
                tracing::debug!(%fp, kind, "query miss, fetching upstream");
                let fetched = self.source.one(kind, query, locations).await?;
                let items: Vec<SourceItem<V>> = fetched.into_iter().collect();
                let mut events = Vec::new();
                {
                    let mut state = self.state.lock();
                    for item in &items {
                        self.store_item(
                            &mut state,
                            &item.key,
                            item.value.clone(),
                            CacheEventKind::ItemRetrieved,
                            EventReason::Fetched,
                            &mut events,
                        );
                    }
                    let keys = items.iter().map(|item| item.key.clone()).collect();
                    state.map.set_query_result(
                        fp.clone(),
                        QueryResultEntry::new(kind, locations.to_vec(), keys, false),
                    );
                    events.push(CacheEvent::query(
                        CacheEventKind::QueryExecuted,
                        fp.clone(),
                        locations.to_vec(),
                        EventReason::Fetched,
                    ));
                }
                self.flush(events);
                Ok(items)
            })
            .await;
        if !led.load(Ordering::Relaxed) {
            self.state.lock().coalesced += 1;
        }
        Ok(fetched?.into_iter().next().map(|item| item.value))
    }

    /// Creates an item upstream, stores the returned value, and drops
    /// every query result scoped to the new item's kind and location.
    pub async fn create(
        &self,
        kind: &str,
        value: &Value,
        locations: &[LocationRef],
    ) -> Result<V, CacheError> {
        let item = self.source.create(kind, value, locations).await?;
        if self.bypass {
            return Ok(item.value);
        }
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            self.drop_scoped_queries(&mut state, kind, item.key.location(), &mut events);
            self.store_item(
                &mut state,
                &item.key,
                item.value.clone(),
                CacheEventKind::ItemCreated,
                EventReason::ItemChanged,
                &mut events,
            );
        }
        self.flush(events);
        Ok(item.value)
    }

    fn drop_scoped_queries(
        &self,
        state: &mut CacheState<V, M>,
        kind: &str,
        scope: &[LocationRef],
        events: &mut Vec<CacheEvent>,
    ) {
        for (fp, entry) in state.map.query_results() {
            if entry.scoped_to(kind, scope) {
                state.map.delete_query_result(&fp);
                events.push(CacheEvent::query(
                    CacheEventKind::QueryInvalidated,
                    fp,
                    scope.to_vec(),
                    EventReason::ItemChanged,
                ));
            }
        }
    }

    /// Applies `changes` upstream, then invalidates the key (dropping any
    /// query result that referenced it) and write-throughs the returned
    /// value.
    pub async fn update(&self, key: &ItemKey, changes: &Value) -> Result<Option<V>, CacheError> {
        key.validate()?;
        let updated = self.source.update(key, changes).await?;
        if self.bypass {
            return Ok(updated);
        }
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            self.invalidate_keys_locked(&mut state, std::slice::from_ref(key), &mut events);
            if let Some(value) = &updated {
                self.store_item(
                    &mut state,
                    key,
                    value.clone(),
                    CacheEventKind::ItemUpdated,
                    EventReason::ItemChanged,
                    &mut events,
                );
            }
        }
        self.flush(events);
        Ok(updated)
    }

    /// Removes an item upstream, then invalidates it locally.
    pub async fn remove(&self, key: &ItemKey) -> Result<(), CacheError> {
        key.validate()?;
        self.source.remove(key).await?;
        if self.bypass {
            return Ok(());
        }
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            self.invalidate_keys_locked(&mut state, std::slice::from_ref(key), &mut events);
            events.push(CacheEvent::item(
                CacheEventKind::ItemRemoved,
                key.clone(),
                EventReason::ItemChanged,
            ));
        }
        self.flush(events);
        Ok(())
    }

    /// Runs a named server-side action on one item, treating it as an
    /// update of that item.
    pub async fn action(
        &self,
        key: &ItemKey,
        name: &str,
        payload: &Value,
    ) -> Result<Option<V>, CacheError> {
        key.validate()?;
        let result = self.source.action(key, name, payload).await?;
        if self.bypass {
            return Ok(result);
        }
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            self.invalidate_keys_locked(&mut state, std::slice::from_ref(key), &mut events);
            if let Some(value) = &result {
                self.store_item(
                    &mut state,
                    key,
                    value.clone(),
                    CacheEventKind::ItemUpdated,
                    EventReason::ItemChanged,
                    &mut events,
                );
            }
        }
        self.flush(events);
        Ok(result)
    }

    /// Runs a named server-side action over a kind/location scope. The
    /// scope is invalidated and the affected items are stored, but no
    /// query fingerprint is recorded: the action's result set is not a
    /// reusable query answer.
    pub async fn all_action(
        &self,
        kind: &str,
        name: &str,
        payload: &Value,
        locations: &[LocationRef],
    ) -> Result<Vec<V>, CacheError> {
        if self.bypass {
            let items = self.source.all_action(kind, name, payload, locations).await?;
            return Ok(items.into_iter().map(|i| i.value).collect());
        }
        let snapshot = self.resident_snapshot(locations);
        let items = self.source.all_action(kind, name, payload, locations).await?;
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            for key in state.map.all_in(locations).into_iter().map(|(key, _)| key) {
                state.eviction.record_remove(&key);
            }
            state.map.invalidate_location(locations);
            for item in &items {
                let kind_event = if snapshot.contains(&item.key.normalize()) {
                    CacheEventKind::ItemUpdated
                } else {
                    CacheEventKind::ItemCreated
                };
                self.store_item(
                    &mut state,
                    &item.key,
                    item.value.clone(),
                    kind_event,
                    EventReason::ItemChanged,
                    &mut events,
                );
            }
        }
        self.flush(events);
        Ok(items.into_iter().map(|i| i.value).collect())
    }

    /// Local write-through without an upstream call. An existing key is
    /// invalidated first (dropping query results that referenced it); a
    /// new key drops enumerations scoped to its kind and location, which
    /// would otherwise be silently incomplete.
    pub fn set(&self, key: &ItemKey, value: V) -> Result<(), CacheError> {
        key.validate()?;
        if self.bypass {
            return Ok(());
        }
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            let existed = state.map.includes_key(key);
            if existed {
                self.invalidate_keys_locked(&mut state, std::slice::from_ref(key), &mut events);
            } else {
                self.drop_scoped_queries(&mut state, key.kind(), key.location(), &mut events);
            }
            let kind_event = if existed {
                CacheEventKind::ItemUpdated
            } else {
                CacheEventKind::ItemCreated
            };
            self.store_item(
                &mut state,
                key,
                value,
                kind_event,
                EventReason::ItemChanged,
                &mut events,
            );
        }
        self.flush(events);
        Ok(())
    }

    fn invalidate_keys_locked(
        &self,
        state: &mut CacheState<V, M>,
        keys: &[ItemKey],
        events: &mut Vec<CacheEvent>,
    ) {
        let normalized: Vec<NormalizedKey> = keys.iter().map(ItemKey::normalize).collect();
        for (fp, entry) in state.map.query_results() {
            if entry.references_any(&normalized) {
                events.push(CacheEvent::query(
                    CacheEventKind::QueryInvalidated,
                    fp,
                    entry.scope().to_vec(),
                    EventReason::Invalidated,
                ));
            }
        }
        state.map.invalidate_item_keys(keys);
        for key in keys {
            state.eviction.record_remove(key);
        }
    }

    /// Drops the given keys and every query result referencing any of
    /// them.
    pub fn invalidate(&self, keys: &[ItemKey]) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            self.invalidate_keys_locked(&mut state, keys, &mut events);
            for key in keys {
                events.push(CacheEvent::item(
                    CacheEventKind::ItemRemoved,
                    key.clone(),
                    EventReason::Invalidated,
                ));
            }
        }
        tracing::debug!(keys = keys.len(), "invalidated keys");
        self.flush(events);
    }

    /// Drops every item whose location chain exactly matches `locations`
    /// (all primary-keyed items when empty) and the entire query table.
    pub fn invalidate_location(&self, locations: &[LocationRef]) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            for key in state.map.all_in(locations).into_iter().map(|(key, _)| key) {
                state.eviction.record_remove(&key);
                events.push(CacheEvent::item(
                    CacheEventKind::ItemRemoved,
                    key,
                    EventReason::Invalidated,
                ));
            }
            state.map.invalidate_location(locations);
        }
        tracing::debug!(
            scope = crate::key::normalize_scope(locations).as_str(),
            items = events.len(),
            "invalidated location"
        );
        self.flush(events);
    }

    /// `true` if a value is stored under the key, expired or not.
    pub fn includes_key(&self, key: &ItemKey) -> bool {
        self.state.lock().map.includes_key(key)
    }

    /// Reads the cached value without touching recency or TTL state.
    pub fn peek(&self, key: &ItemKey) -> Option<V> {
        self.state.lock().map.peek(key).cloned()
    }

    /// Sets or clears a per-entry TTL override. No effect on absent keys.
    pub fn set_ttl_override(&self, key: &ItemKey, ttl: Option<Duration>) {
        let mut state = self.state.lock();
        if let Some(mut meta) = state.map.meta(key) {
            meta.ttl_override = ttl;
            state.map.set_meta(key, meta);
        }
    }

    /// Drops all cached state.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.map.clear();
        state.eviction.clear();
    }

    /// Current counters and resident size.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            coalesced: state.coalesced,
            evictions: state.eviction.evictions(),
            expirations: state.expirations,
            size: state.map.current_size(),
        }
    }

    /// Sweeps expired entries and runs policy decay. Called by the
    /// maintenance task; callable directly in tests or single-threaded
    /// embeddings.
    pub fn run_maintenance(&self) {
        let mut events = Vec::new();
        {
            let mut state = self.state.lock();
            for key in self.ttl.expired_keys(&state.map) {
                self.expire(&mut state, &key, &mut events);
            }
            state.eviction.tick();
        }
        self.flush(events);
    }

    /// Starts the background maintenance task. Idempotent.
    pub fn start_maintenance(self: &Arc<Self>) {
        let mut task = self.maintenance.lock();
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let cache = Arc::downgrade(self);
        let interval = self.maintenance_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    return;
                };
                cache.run_maintenance();
            }
        }));
    }

    /// Stops background tasks. Pending flights settle normally.
    pub fn shutdown(&self) {
        if let Some(task) = self.maintenance.lock().take() {
            task.abort();
        }
        self.point_flights.shutdown();
        self.query_flights.shutdown();
    }
}

impl<V, S, M> Drop for SourceCache<V, S, M>
where
    V: Clone + Serialize + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(task) = self.maintenance.lock().take() {
            task.abort();
        }
    }
}
