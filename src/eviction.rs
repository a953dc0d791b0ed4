//! Size-limit enforcement over a pluggable eviction policy.
//!
//! The manager owns the limits and the bookkeeping; the policy only orders
//! keys. Before a new entry is admitted, victims are drained until both the
//! item and byte limits would hold with the new entry in place, then the
//! new entry is recorded. Evicting before recording keeps the incoming key
//! out of the candidate set, so even MRU never nominates the entry that is
//! being inserted.
//!
//! Policies speak normalized key strings. A victim string that no longer
//! parses back into an item key means the policy state drifted from the
//! store; such victims are logged and skipped rather than allowed to
//! poison the removal path.

use rustc_hash::FxHashMap;

use crate::key::ItemKey;
use crate::map::SizeLimits;
use crate::policy::{EvictionPolicy, PolicyConfig};

/// Enforces item/byte limits by draining policy victims.
pub struct EvictionManager {
    policy: Box<dyn EvictionPolicy>,
    max_items: Option<usize>,
    max_bytes: Option<u64>,
    sizes: FxHashMap<String, u64>,
    bytes: u64,
    evictions: u64,
}

impl std::fmt::Debug for EvictionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvictionManager")
            .field("policy", &self.policy.name())
            .field("items", &self.sizes.len())
            .field("bytes", &self.bytes)
            .field("max_items", &self.max_items)
            .field("max_bytes", &self.max_bytes)
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl EvictionManager {
    /// Creates a manager running `config`'s policy under `limits`.
    pub fn new(config: &PolicyConfig, limits: SizeLimits) -> Self {
        Self {
            policy: config.build(),
            max_items: limits.max_items,
            max_bytes: limits.max_bytes,
            sizes: FxHashMap::default(),
            bytes: 0,
            evictions: 0,
        }
    }

    /// Admits `key` with `size` bytes, first evicting until both limits
    /// hold with the new entry counted. Returns the evicted keys; the
    /// caller discards them from storage.
    pub fn record_insert(&mut self, key: &ItemKey, size: u64) -> Vec<ItemKey> {
        let normalized = key.normalize().into_inner();
        // An overwrite releases its old size before the limit check and
        // never competes against itself for a slot.
        let replacing = self.sizes.remove(&normalized);
        if let Some(old) = replacing {
            self.bytes = self.bytes.saturating_sub(old);
        }

        let mut victims = Vec::new();
        loop {
            let over_items = self
                .max_items
                .is_some_and(|max| self.sizes.len() + 1 > max);
            let over_bytes = self.max_bytes.is_some_and(|max| self.bytes + size > max);
            if !over_items && !over_bytes {
                break;
            }
            let Some(victim) = self.policy.pick_victim() else {
                break;
            };
            let freed = self.sizes.remove(&victim).unwrap_or(0);
            self.bytes = self.bytes.saturating_sub(freed);
            self.evictions += 1;
            match crate::key::NormalizedKey::from_raw(victim.clone()).parse() {
                Ok(item_key) => victims.push(item_key),
                Err(err) => {
                    tracing::warn!(key = %victim, %err, "dropping unparseable eviction victim");
                }
            }
        }

        self.policy.record_insert(&normalized);
        self.sizes.insert(normalized, size);
        self.bytes += size;
        victims
    }

    /// Records a read of `key`.
    pub fn record_access(&mut self, key: &ItemKey) {
        self.policy.record_access(key.normalize().as_str());
    }

    /// Forgets `key` after an external removal (delete, expiry,
    /// invalidation). Not counted as an eviction.
    pub fn record_remove(&mut self, key: &ItemKey) {
        let normalized = key.normalize().into_inner();
        if let Some(size) = self.sizes.remove(&normalized) {
            self.bytes = self.bytes.saturating_sub(size);
        }
        self.policy.record_remove(&normalized);
    }

    /// Runs the policy's periodic maintenance (frequency decay).
    pub fn tick(&mut self) {
        self.policy.tick();
    }

    /// Drops all tracked state.
    pub fn clear(&mut self) {
        self.policy.clear();
        self.sizes.clear();
        self.bytes = 0;
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// `true` when nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Tracked byte total.
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Total keys evicted over the manager's lifetime.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Name of the active policy.
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }
}
