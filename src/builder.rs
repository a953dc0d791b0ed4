//! Fluent construction of a [`SourceCache`].
//!
//! The builder covers the common case of the in-memory backend. Custom
//! [`CacheMap`](crate::map::CacheMap) backends go through
//! [`SourceCache::with_storage`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use readthrough::builder::SourceCacheBuilder;
//! use readthrough::policy::PolicyConfig;
//! # use readthrough::error::SourceError;
//! # use readthrough::key::{ItemKey, LocationRef};
//! # use readthrough::query::Query;
//! # use readthrough::source::{DataSource, SourceItem};
//! # use async_trait::async_trait;
//! # struct Remote;
//! # #[async_trait]
//! # impl DataSource<serde_json::Value> for Remote {
//! #     async fn get(&self, _: &ItemKey) -> Result<Option<serde_json::Value>, SourceError> { Ok(None) }
//! #     async fn all(&self, _: &str, _: &Query, _: &[LocationRef]) -> Result<Vec<SourceItem<serde_json::Value>>, SourceError> { Ok(vec![]) }
//! #     async fn one(&self, _: &str, _: &Query, _: &[LocationRef]) -> Result<Option<SourceItem<serde_json::Value>>, SourceError> { Ok(None) }
//! #     async fn create(&self, _: &str, _: &serde_json::Value, _: &[LocationRef]) -> Result<SourceItem<serde_json::Value>, SourceError> { Err(SourceError::new("unsupported")) }
//! #     async fn update(&self, _: &ItemKey, _: &serde_json::Value) -> Result<Option<serde_json::Value>, SourceError> { Ok(None) }
//! #     async fn remove(&self, _: &ItemKey) -> Result<(), SourceError> { Ok(()) }
//! #     async fn action(&self, _: &ItemKey, _: &str, _: &serde_json::Value) -> Result<Option<serde_json::Value>, SourceError> { Ok(None) }
//! #     async fn all_action(&self, _: &str, _: &str, _: &serde_json::Value, _: &[LocationRef]) -> Result<Vec<SourceItem<serde_json::Value>>, SourceError> { Ok(vec![]) }
//! # }
//!
//! let cache = SourceCacheBuilder::new(Remote)
//!     .max_items(10_000)
//!     .max_size("10MB")
//!     .ttl(Duration::from_secs(300))
//!     .policy(PolicyConfig::Lru)
//!     .try_build()
//!     .unwrap();
//! # let _ = cache;
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::SourceCache;
use crate::config::{parse_size, CacheConfig};
use crate::error::{CacheError, ConfigError};
use crate::events::{EventSink, NullSink};
use crate::map::{CacheMap, MemoryCacheMap};
use crate::policy::{PolicyConfig, ValidationMode};
use crate::source::DataSource;

/// Builds a [`SourceCache`] over the in-memory backend.
pub struct SourceCacheBuilder<V, S> {
    source: S,
    config: CacheConfig,
    pending_size: Option<String>,
    events: Arc<dyn EventSink>,
    _values: PhantomData<fn() -> V>,
}

impl<V, S> SourceCacheBuilder<V, S>
where
    V: Clone + Serialize + Send + Sync + 'static,
    S: DataSource<V> + 'static,
{
    /// Starts a builder around `source` with default configuration.
    pub fn new(source: S) -> Self {
        Self {
            source,
            config: CacheConfig::default(),
            pending_size: None,
            events: Arc::new(NullSink),
            _values: PhantomData,
        }
    }

    /// Caps the resident item count.
    pub fn max_items(mut self, max: usize) -> Self {
        self.config.max_items = Some(max);
        self
    }

    /// Caps the resident byte total.
    pub fn max_bytes(mut self, max: u64) -> Self {
        self.config.max_bytes = Some(max);
        self
    }

    /// Caps the resident byte total from a size string such as `"10MB"`.
    /// Parsed at build time.
    pub fn max_size(mut self, size: impl Into<String>) -> Self {
        self.pending_size = Some(size.into());
        self
    }

    /// Selects the eviction policy.
    pub fn policy(mut self, policy: PolicyConfig) -> Self {
        self.config.policy = policy;
        self
    }

    /// Sets the cache-wide default TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = Some(ttl);
        self
    }

    /// Routes every operation straight to the upstream.
    pub fn bypass(mut self) -> Self {
        self.config.bypass_cache = true;
        self
    }

    /// Chooses how out-of-range tuning values are handled.
    pub fn validation(mut self, mode: ValidationMode) -> Self {
        self.config.validation = mode;
        self
    }

    /// Sets the background maintenance interval.
    pub fn maintenance_interval(mut self, interval: Duration) -> Self {
        self.config.maintenance_interval = interval;
        self
    }

    /// Sends cache events to `sink` instead of discarding them.
    pub fn events(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    fn resolved_config(mut self) -> Result<(S, CacheConfig, Arc<dyn EventSink>), ConfigError> {
        if let Some(size) = self.pending_size.take() {
            self.config.max_bytes = Some(parse_size(&size)?);
        }
        let config = self.config.validated()?;
        Ok((self.source, config, self.events))
    }

    /// Builds the cache, failing on invalid configuration.
    pub fn try_build(self) -> Result<SourceCache<V, S>, CacheError> {
        let (source, config, events) = self.resolved_config()?;
        let map = MemoryCacheMap::with_limits(config.size_limits());
        Ok(SourceCache::from_parts(source, config, map, events))
    }

    /// Builds the cache under sanitize-mode validation, which clamps
    /// rather than fails. An unparseable size string still fails.
    pub fn build(self) -> Result<SourceCache<V, S>, CacheError> {
        self.validation(ValidationMode::Sanitize).try_build()
    }
}

impl<V, S, M> SourceCache<V, S, M>
where
    V: Clone + Serialize + Send + Sync + 'static,
    S: DataSource<V> + 'static,
    M: CacheMap<V> + Send + 'static,
{
    /// Creates a cache over a custom storage backend.
    pub fn with_storage(
        source: S,
        config: CacheConfig,
        map: M,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, CacheError> {
        let config = config.validated()?;
        Ok(Self::from_parts(source, config, map, events))
    }
}
