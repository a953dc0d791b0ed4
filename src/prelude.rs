//! One-stop imports for typical use.
//!
//! ```
//! use readthrough::prelude::*;
//! ```

pub use crate::builder::SourceCacheBuilder;
pub use crate::cache::{CacheStats, SourceCache};
pub use crate::config::CacheConfig;
pub use crate::error::CacheError;
pub use crate::events::{CacheEvent, CacheEventKind, EventReason, EventSink};
pub use crate::key::{ItemId, ItemKey, LocationRef, NormalizedKey};
pub use crate::map::{CacheMap, MemoryCacheMap};
pub use crate::policy::{
    ArcConfig, LfuConfig, PolicyConfig, TwoQConfig, ValidationMode,
};
pub use crate::query::{Facet, Query, QueryFingerprint};
pub use crate::source::{DataSource, SourceItem};
