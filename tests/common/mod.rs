//! Shared test fixture: an in-memory upstream with call counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use readthrough::error::SourceError;
use readthrough::key::{ItemKey, LocationRef};
use readthrough::query::Query;
use readthrough::source::{DataSource, SourceItem};

/// Number of upstream calls seen, per operation.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub get: AtomicUsize,
    pub all: AtomicUsize,
    pub one: AtomicUsize,
    pub create: AtomicUsize,
    pub update: AtomicUsize,
    pub remove: AtomicUsize,
    pub action: AtomicUsize,
    pub all_action: AtomicUsize,
}

/// Programmable upstream: a keyed store plus call counters. Items are
/// ordered by normalized key so enumeration results are deterministic.
pub struct MockSource {
    items: Mutex<BTreeMap<String, SourceItem<Value>>>,
    pub calls: CallCounts,
    fail: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
    next_id: AtomicU64,
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSource {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(BTreeMap::new()),
            calls: CallCounts::default(),
            fail: Mutex::new(None),
            delay: Mutex::new(None),
            next_id: AtomicU64::new(1000),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seeds an item into the upstream store.
    pub fn put(&self, key: ItemKey, value: Value) {
        let normalized = key.normalize().into_inner();
        self.items
            .lock()
            .insert(normalized, SourceItem::new(key, value));
    }

    /// Makes every subsequent call fail with the given message.
    pub fn fail_with(&self, message: &str) {
        *self.fail.lock() = Some(message.to_owned());
    }

    /// Clears a previously set failure.
    pub fn recover(&self) {
        *self.fail.lock() = None;
    }

    /// Adds artificial latency to every call, to widen race windows.
    pub fn delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    async fn gate(&self) -> Result<(), SourceError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.fail.lock().clone() {
            Some(message) => Err(SourceError::new(message)),
            None => Ok(()),
        }
    }

    fn matching(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Vec<SourceItem<Value>> {
        let want_scope: Vec<String> = locations
            .iter()
            .map(|l| format!("{}:{}", l.kind, l.id.canonical()))
            .collect();
        self.items
            .lock()
            .values()
            .filter(|item| {
                let scope: Vec<String> = item
                    .key
                    .location()
                    .iter()
                    .map(|l| format!("{}:{}", l.kind, l.id.canonical()))
                    .collect();
                item.key.kind() == kind && scope == want_scope && query.matches(&item.value)
            })
            .cloned()
            .collect()
    }

    fn merge(base: &mut Value, changes: &Value) {
        if let (Value::Object(base), Value::Object(changes)) = (base, changes) {
            for (k, v) in changes {
                base.insert(k.clone(), v.clone());
            }
        }
    }
}

#[async_trait]
impl DataSource<Value> for MockSource {
    async fn get(&self, key: &ItemKey) -> Result<Option<Value>, SourceError> {
        self.calls.get.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let normalized = key.normalize().into_inner();
        Ok(self.items.lock().get(&normalized).map(|i| i.value.clone()))
    }

    async fn all(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<Value>>, SourceError> {
        self.calls.all.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.matching(kind, query, locations))
    }

    async fn one(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Option<SourceItem<Value>>, SourceError> {
        self.calls.one.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        Ok(self.matching(kind, query, locations).into_iter().next())
    }

    async fn create(
        &self,
        kind: &str,
        value: &Value,
        locations: &[LocationRef],
    ) -> Result<SourceItem<Value>, SourceError> {
        self.calls.create.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
        let key = if locations.is_empty() {
            ItemKey::primary(kind, id)
        } else {
            ItemKey::composite(kind, id, locations.to_vec())
        };
        let item = SourceItem::new(key.clone(), value.clone());
        self.items
            .lock()
            .insert(key.normalize().into_inner(), item.clone());
        Ok(item)
    }

    async fn update(&self, key: &ItemKey, changes: &Value) -> Result<Option<Value>, SourceError> {
        self.calls.update.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let normalized = key.normalize().into_inner();
        let mut items = self.items.lock();
        Ok(items.get_mut(&normalized).map(|item| {
            Self::merge(&mut item.value, changes);
            item.value.clone()
        }))
    }

    async fn remove(&self, key: &ItemKey) -> Result<(), SourceError> {
        self.calls.remove.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        self.items.lock().remove(&key.normalize().into_inner());
        Ok(())
    }

    async fn action(
        &self,
        key: &ItemKey,
        _name: &str,
        payload: &Value,
    ) -> Result<Option<Value>, SourceError> {
        self.calls.action.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let normalized = key.normalize().into_inner();
        let mut items = self.items.lock();
        Ok(items.get_mut(&normalized).map(|item| {
            Self::merge(&mut item.value, payload);
            item.value.clone()
        }))
    }

    async fn all_action(
        &self,
        kind: &str,
        _name: &str,
        payload: &Value,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<Value>>, SourceError> {
        self.calls.all_action.fetch_add(1, Ordering::SeqCst);
        self.gate().await?;
        let affected = self.matching(kind, &Query::new(), locations);
        let mut items = self.items.lock();
        let mut out = Vec::new();
        for item in affected {
            let normalized = item.key.normalize().into_inner();
            if let Some(stored) = items.get_mut(&normalized) {
                Self::merge(&mut stored.value, payload);
                out.push(stored.clone());
            }
        }
        Ok(out)
    }
}
