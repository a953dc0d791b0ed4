//! Read-through caching for structured, hierarchically keyed data.
//!
//! `readthrough` sits in front of an asynchronous [`DataSource`] and keeps
//! point reads and query results warm while staying honest about
//! invalidation: every mutation drops exactly the cached state it can no
//! longer vouch for, and a partial query result can never masquerade as a
//! complete one.
//!
//! # Layers
//!
//! ```text
//!   ┌────────────────────────────────────────────────────────┐
//!   │ SourceCache            get / all / one / create / ...  │
//!   ├──────────────┬─────────────────┬───────────────────────┤
//!   │ TtlManager   │ EvictionManager │ RequestCoordinator    │
//!   │ freshness    │ LRU FIFO MRU    │ single-flight dedup   │
//!   │              │ Random LFU      │                       │
//!   │              │ ARC 2Q          │                       │
//!   ├──────────────┴─────────────────┴───────────────────────┤
//!   │ CacheMap               items · metadata · query table  │
//!   ├────────────────────────────────────────────────────────┤
//!   │ keys & fingerprints    normalization · canonical JSON  │
//!   └────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! # use readthrough::prelude::*;
//! # use readthrough::error::SourceError;
//! # use async_trait::async_trait;
//! # use serde_json::{json, Value};
//! # struct Remote;
//! # #[async_trait]
//! # impl DataSource<Value> for Remote {
//! #     async fn get(&self, _: &ItemKey) -> Result<Option<Value>, SourceError> { Ok(Some(json!({}))) }
//! #     async fn all(&self, _: &str, _: &Query, _: &[LocationRef]) -> Result<Vec<SourceItem<Value>>, SourceError> { Ok(vec![]) }
//! #     async fn one(&self, _: &str, _: &Query, _: &[LocationRef]) -> Result<Option<SourceItem<Value>>, SourceError> { Ok(None) }
//! #     async fn create(&self, _: &str, _: &Value, _: &[LocationRef]) -> Result<SourceItem<Value>, SourceError> { Err(SourceError::new("unsupported")) }
//! #     async fn update(&self, _: &ItemKey, _: &Value) -> Result<Option<Value>, SourceError> { Ok(None) }
//! #     async fn remove(&self, _: &ItemKey) -> Result<(), SourceError> { Ok(()) }
//! #     async fn action(&self, _: &ItemKey, _: &str, _: &Value) -> Result<Option<Value>, SourceError> { Ok(None) }
//! #     async fn all_action(&self, _: &str, _: &str, _: &Value, _: &[LocationRef]) -> Result<Vec<SourceItem<Value>>, SourceError> { Ok(vec![]) }
//! # }
//! # #[tokio::main] async fn main() -> Result<(), CacheError> {
//! let cache = SourceCacheBuilder::new(Remote)
//!     .max_items(10_000)
//!     .policy(PolicyConfig::Lru)
//!     .try_build()?;
//!
//! // First read goes upstream; the second is served from the cache.
//! let key = ItemKey::primary("task", 42);
//! let first = cache.get(&key).await?;
//! let second = cache.get(&key).await?;
//! assert_eq!(first, second);
//! # Ok(()) }
//! ```
//!
//! # Consistency rules
//!
//! Query results store keys, never values. Deleting one cached item
//! surgically shrinks the query results that referenced it; evicting or
//! expiring one silently breaks them, and the break is detected on the
//! next resolution. Bulk invalidation drops whole query results instead of
//! shrinking them. Complete and partial enumerations are fingerprinted
//! apart, and only a filtered query may answer itself from a scan of
//! resident items, and then only underneath a still-valid complete
//! enumeration of the same scope.
//!
//! [`DataSource`]: crate::source::DataSource

pub mod builder;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod ds;
pub mod error;
pub mod events;
pub mod eviction;
pub mod key;
pub mod map;
pub mod policy;
pub mod prelude;
pub mod query;
pub mod query_cache;
pub mod source;
pub mod ttl;

pub use builder::SourceCacheBuilder;
pub use cache::{CacheStats, SourceCache};
pub use config::CacheConfig;
pub use error::CacheError;
pub use key::{ItemId, ItemKey, LocationRef, NormalizedKey};
pub use query::{Facet, Query, QueryFingerprint};
pub use source::{DataSource, SourceItem};
