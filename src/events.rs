//! Structured notifications for cache state transitions.
//!
//! The cache emits one [`CacheEvent`] per transition of interest. Delivery
//! mechanics live with the consumer; the [`EventSink`] boundary here is
//! synchronous and infallible so the hot path never blocks on a listener.

use crate::key::{ItemKey, LocationRef};
use crate::query::QueryFingerprint;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEventKind {
    /// An item was fetched from upstream and stored.
    ItemRetrieved,
    /// An item previously unknown to the cache appeared.
    ItemCreated,
    /// A cached item's value changed.
    ItemUpdated,
    /// An item was removed (delete, eviction, or expiry).
    ItemRemoved,
    /// A query ran upstream and its result was recorded.
    QueryExecuted,
    /// A recorded query result was dropped.
    QueryInvalidated,
}

/// Why it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventReason {
    /// A read-through fetch populated the entry.
    Fetched,
    /// A write-path mutation changed the item.
    ItemChanged,
    /// The eviction policy reclaimed space.
    Evicted,
    /// The entry outlived its TTL.
    Expired,
    /// An explicit invalidation call.
    Invalidated,
}

/// A single state-transition notification.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    /// Transition kind.
    pub kind: CacheEventKind,
    /// Affected item keys, empty for pure query events.
    pub keys: Vec<ItemKey>,
    /// Affected location scope, when the transition is scope-wide.
    pub scope: Vec<LocationRef>,
    /// Fingerprint of the affected query, for query events.
    pub fingerprint: Option<QueryFingerprint>,
    /// Reason code.
    pub reason: EventReason,
}

impl CacheEvent {
    /// An item-level event over one key.
    pub fn item(kind: CacheEventKind, key: ItemKey, reason: EventReason) -> Self {
        Self {
            kind,
            keys: vec![key],
            scope: Vec::new(),
            fingerprint: None,
            reason,
        }
    }

    /// A query-level event.
    pub fn query(
        kind: CacheEventKind,
        fingerprint: QueryFingerprint,
        scope: Vec<LocationRef>,
        reason: EventReason,
    ) -> Self {
        Self {
            kind,
            keys: Vec::new(),
            scope,
            fingerprint: Some(fingerprint),
            reason,
        }
    }
}

/// Receives cache events. Implementations must be cheap and non-blocking.
pub trait EventSink: Send + Sync {
    /// Handles one event.
    fn emit(&self, event: CacheEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CacheEvent) {}
}

/// Buffers events in memory. Intended for tests and diagnostics.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: parking_lot::Mutex<Vec<CacheEvent>>,
}

impl MemorySink {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn events(&self) -> Vec<CacheEvent> {
        self.events.lock().clone()
    }

    /// Number of events of the given kind seen so far.
    pub fn count(&self, kind: &CacheEventKind) -> usize {
        self.events.lock().iter().filter(|e| e.kind == *kind).count()
    }

    /// Drops all buffered events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CacheEvent) {
        self.events.lock().push(event);
    }
}
