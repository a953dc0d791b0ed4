//! Time-to-live tracking layered over entry metadata.
//!
//! TTL state lives entirely in [`EntryMeta`]: the insertion timestamp and an
//! optional per-entry override. The manager holds only the cache-wide
//! default and interprets that metadata. Expiry is checked lazily on read
//! and swept eagerly by the maintenance task; an expired entry that nobody
//! touches still counts against size limits until one of the two notices it.
//!
//! Per-call override precedence: an explicit TTL on the lookup wins over
//! the entry's stored override, which wins over the cache default. A zero
//! TTL means "already expired" and forces a miss.

use std::time::Duration;

use serde::Serialize;

use crate::key::ItemKey;
use crate::map::{CacheMap, EntryMeta};

/// Interprets entry metadata against a cache-wide default TTL.
#[derive(Debug, Clone, Default)]
pub struct TtlManager {
    default_ttl: Option<Duration>,
}

/// Expiry diagnostics for a single entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlInfo {
    /// Whether any TTL applies to the entry at all.
    pub has_ttl: bool,
    /// The TTL in effect (override or default).
    pub ttl: Option<Duration>,
    /// Whether the entry has outlived its TTL.
    pub is_expired: bool,
    /// Time left before expiry, `None` when no TTL applies or expired.
    pub remaining: Option<Duration>,
}

impl TtlManager {
    /// A manager with no default TTL. Entries without an override live
    /// forever.
    pub fn disabled() -> Self {
        Self { default_ttl: None }
    }

    /// A manager applying `default_ttl` to every entry without an override.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self { default_ttl }
    }

    /// `true` if a cache-wide default TTL is configured.
    pub fn is_enabled(&self) -> bool {
        self.default_ttl.is_some()
    }

    /// The configured cache-wide default.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// The TTL in effect for an entry: its override if set, else the
    /// default.
    pub fn effective_ttl(&self, meta: &EntryMeta) -> Option<Duration> {
        meta.ttl_override.or(self.default_ttl)
    }

    fn expired(&self, meta: &EntryMeta, ttl: Option<Duration>) -> bool {
        match ttl {
            Some(ttl) => ttl.is_zero() || meta.added_at.elapsed() >= ttl,
            None => false,
        }
    }

    /// `true` if the entry for `key` is still live (present and within its
    /// effective TTL). Missing metadata counts as live so storage backends
    /// without metadata support never mass-expire.
    pub fn validate<V, M>(&self, key: &ItemKey, map: &M) -> bool
    where
        V: Clone + Serialize,
        M: CacheMap<V>,
    {
        match map.meta(key) {
            Some(meta) => !self.expired(&meta, self.effective_ttl(&meta)),
            None => true,
        }
    }

    /// Like [`validate`](Self::validate) but with a per-call TTL that wins
    /// over both the entry override and the default. A zero `ttl` always
    /// reports dead, which callers use to force a refetch.
    pub fn validate_with(&self, meta: &EntryMeta, ttl: Duration) -> bool {
        !self.expired(meta, Some(ttl))
    }

    /// Expiry diagnostics for an entry.
    pub fn info(&self, meta: &EntryMeta) -> TtlInfo {
        let ttl = self.effective_ttl(meta);
        let is_expired = self.expired(meta, ttl);
        let remaining = match ttl {
            Some(ttl) if !is_expired => ttl.checked_sub(meta.added_at.elapsed()),
            _ => None,
        };
        TtlInfo {
            has_ttl: ttl.is_some(),
            ttl,
            is_expired,
            remaining,
        }
    }

    /// Collects every expired key in the map. Used by the maintenance
    /// sweep; callers discard the returned keys.
    pub fn expired_keys<V, M>(&self, map: &M) -> Vec<ItemKey>
    where
        V: Clone + Serialize,
        M: CacheMap<V>,
    {
        map.all_meta()
            .into_iter()
            .filter(|(_, meta)| self.expired(meta, self.effective_ttl(meta)))
            .map(|(key, _)| key)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::MemoryCacheMap;
    use serde_json::{json, Value};
    use std::time::Instant;

    fn aged(age: Duration, ttl_override: Option<Duration>) -> EntryMeta {
        let mut meta = EntryMeta::new(0);
        meta.added_at = Instant::now() - age;
        meta.ttl_override = ttl_override;
        meta
    }

    #[test]
    fn no_default_means_immortal() {
        let ttl = TtlManager::disabled();
        let meta = aged(Duration::from_secs(3600), None);
        assert!(!ttl.info(&meta).has_ttl);
        assert!(!ttl.info(&meta).is_expired);
    }

    #[test]
    fn override_beats_default() {
        let ttl = TtlManager::new(Some(Duration::from_secs(1)));
        let meta = aged(Duration::from_secs(10), Some(Duration::from_secs(3600)));
        assert_eq!(ttl.effective_ttl(&meta), Some(Duration::from_secs(3600)));
        assert!(!ttl.info(&meta).is_expired);
    }

    #[test]
    fn zero_ttl_is_always_expired() {
        let ttl = TtlManager::disabled();
        let meta = aged(Duration::ZERO, None);
        assert!(!ttl.validate_with(&meta, Duration::ZERO));
    }

    #[test]
    fn validate_consults_map_metadata() {
        let ttl = TtlManager::new(Some(Duration::from_millis(1)));
        let mut map: MemoryCacheMap<Value> = MemoryCacheMap::new();
        let key = ItemKey::primary("task", 1);
        map.set(&key, json!(1), 1);

        let mut meta = map.meta(&key).unwrap();
        meta.added_at = Instant::now() - Duration::from_secs(1);
        map.set_meta(&key, meta);
        assert!(!ttl.validate(&key, &map));
        assert_eq!(ttl.expired_keys(&map), vec![key]);
    }

    #[test]
    fn missing_metadata_counts_as_live() {
        let ttl = TtlManager::new(Some(Duration::from_millis(1)));
        let map: MemoryCacheMap<Value> = MemoryCacheMap::new();
        assert!(ttl.validate(&ItemKey::primary("task", 1), &map));
    }

    #[test]
    fn remaining_shrinks_with_age() {
        let ttl = TtlManager::new(Some(Duration::from_secs(60)));
        let meta = aged(Duration::from_secs(20), None);
        let info = ttl.info(&meta);
        assert!(info.has_ttl);
        let remaining = info.remaining.unwrap();
        assert!(remaining <= Duration::from_secs(40));
        assert!(remaining > Duration::from_secs(30));
    }
}
