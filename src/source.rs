//! Upstream data-source contract.
//!
//! The cache sits in front of anything implementing [`DataSource`]. Absence
//! is a distinguished, recoverable outcome (`Ok(None)` / empty vec), never
//! an error; [`SourceError`] is reserved for genuine failures, which the
//! cache propagates without mutating any cached state.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SourceError;
use crate::key::{ItemKey, LocationRef};
use crate::query::Query;

/// One item returned by the upstream, addressed by its full key.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceItem<V> {
    /// Full key, including the location chain the item lives under.
    pub key: ItemKey,
    /// The item's value.
    pub value: V,
}

impl<V> SourceItem<V> {
    /// Pairs a key with its value.
    pub fn new(key: ItemKey, value: V) -> Self {
        Self { key, value }
    }
}

/// Asynchronous upstream the cache reads through to.
///
/// All operations are failable; `Ok(None)` and `Ok(vec![])` mean the
/// upstream looked and found nothing, which the cache records as a
/// negative result.
#[async_trait]
pub trait DataSource<V>: Send + Sync {
    /// Point read of a single item.
    async fn get(&self, key: &ItemKey) -> Result<Option<V>, SourceError>;

    /// Enumerates items of `kind` under `locations`, optionally filtered
    /// by `query`. An empty query asks for the complete population.
    async fn all(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<V>>, SourceError>;

    /// First item of `kind` matching `query` under `locations`.
    async fn one(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Option<SourceItem<V>>, SourceError>;

    /// Creates an item; the upstream assigns its key.
    async fn create(
        &self,
        kind: &str,
        value: &Value,
        locations: &[LocationRef],
    ) -> Result<SourceItem<V>, SourceError>;

    /// Applies `changes` to an existing item, returning the new value.
    async fn update(&self, key: &ItemKey, changes: &Value) -> Result<Option<V>, SourceError>;

    /// Removes an item. Removing an absent item is not an error.
    async fn remove(&self, key: &ItemKey) -> Result<(), SourceError>;

    /// Invokes a named server-side action on one item, returning its
    /// resulting value when the action produces one.
    async fn action(
        &self,
        key: &ItemKey,
        name: &str,
        payload: &Value,
    ) -> Result<Option<V>, SourceError>;

    /// Invokes a named server-side action over a whole kind/location
    /// scope, returning the affected items.
    async fn all_action(
        &self,
        kind: &str,
        name: &str,
        payload: &Value,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<V>>, SourceError>;
}

/// The cache takes its source by value; callers that keep talking to the
/// same upstream hand it over as an `Arc`, which delegates to the inner
/// source. Also covers `Arc<dyn DataSource<V>>`.
#[async_trait]
impl<V, S> DataSource<V> for Arc<S>
where
    S: DataSource<V> + ?Sized,
{
    async fn get(&self, key: &ItemKey) -> Result<Option<V>, SourceError> {
        (**self).get(key).await
    }

    async fn all(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<V>>, SourceError> {
        (**self).all(kind, query, locations).await
    }

    async fn one(
        &self,
        kind: &str,
        query: &Query,
        locations: &[LocationRef],
    ) -> Result<Option<SourceItem<V>>, SourceError> {
        (**self).one(kind, query, locations).await
    }

    async fn create(
        &self,
        kind: &str,
        value: &Value,
        locations: &[LocationRef],
    ) -> Result<SourceItem<V>, SourceError> {
        (**self).create(kind, value, locations).await
    }

    async fn update(&self, key: &ItemKey, changes: &Value) -> Result<Option<V>, SourceError> {
        (**self).update(key, changes).await
    }

    async fn remove(&self, key: &ItemKey) -> Result<(), SourceError> {
        (**self).remove(key).await
    }

    async fn action(
        &self,
        key: &ItemKey,
        name: &str,
        payload: &Value,
    ) -> Result<Option<V>, SourceError> {
        (**self).action(key, name, payload).await
    }

    async fn all_action(
        &self,
        kind: &str,
        name: &str,
        payload: &Value,
        locations: &[LocationRef],
    ) -> Result<Vec<SourceItem<V>>, SourceError> {
        (**self).all_action(kind, name, payload, locations).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    #[async_trait]
    impl DataSource<i64> for Fixed {
        async fn get(&self, _key: &ItemKey) -> Result<Option<i64>, SourceError> {
            Ok(Some(7))
        }

        async fn all(
            &self,
            _kind: &str,
            _query: &Query,
            _locations: &[LocationRef],
        ) -> Result<Vec<SourceItem<i64>>, SourceError> {
            Ok(vec![])
        }

        async fn one(
            &self,
            _kind: &str,
            _query: &Query,
            _locations: &[LocationRef],
        ) -> Result<Option<SourceItem<i64>>, SourceError> {
            Ok(None)
        }

        async fn create(
            &self,
            kind: &str,
            _value: &Value,
            _locations: &[LocationRef],
        ) -> Result<SourceItem<i64>, SourceError> {
            Ok(SourceItem::new(ItemKey::primary(kind, 1), 7))
        }

        async fn update(
            &self,
            _key: &ItemKey,
            _changes: &Value,
        ) -> Result<Option<i64>, SourceError> {
            Ok(None)
        }

        async fn remove(&self, _key: &ItemKey) -> Result<(), SourceError> {
            Ok(())
        }

        async fn action(
            &self,
            _key: &ItemKey,
            _name: &str,
            _payload: &Value,
        ) -> Result<Option<i64>, SourceError> {
            Ok(None)
        }

        async fn all_action(
            &self,
            _kind: &str,
            _name: &str,
            _payload: &Value,
            _locations: &[LocationRef],
        ) -> Result<Vec<SourceItem<i64>>, SourceError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn shared_source_delegates_through_arc() {
        let source = Arc::new(Fixed);
        let key = ItemKey::primary("t", 1);
        assert_eq!(source.get(&key).await.unwrap(), Some(7));

        let erased: Arc<dyn DataSource<i64>> = Arc::new(Fixed);
        assert_eq!(erased.get(&key).await.unwrap(), Some(7));
    }
}
