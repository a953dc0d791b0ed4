//! Adaptive replacement eviction.
//!
//! Four lists, two resident and two ghost:
//!
//! ```text
//!        resident                    ghost (keys only)
//!   T1: seen once, recent      B1: recently evicted from T1
//!   T2: seen often             B2: recently evicted from T2
//!         ▲                          │
//!         └── target p ◄─────────────┘
//! ```
//!
//! A miss that lands in B1 means the recency side was too small, so the
//! target `p` grows; a hit in B2 shrinks it. Victims come from T1 while it
//! holds more than `p` keys, otherwise from T2. Access counts promote T1
//! keys into T2 at `frequency_threshold` and decay periodically so old
//! frequency is forgotten.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ds::RecencyList;
use crate::policy::{ArcConfig, EvictionPolicy};

/// ARC with bounded ghost lists and an adaptive recency target.
#[derive(Debug)]
pub struct ArcPolicy {
    t1: RecencyList<String>,
    t2: RecencyList<String>,
    b1: RecencyList<String>,
    b2: RecencyList<String>,
    freqs: FxHashMap<String, u64>,
    /// Target size for T1, in keys. Adapted on ghost hits.
    p: f64,
    config: ArcConfig,
    last_decay: Instant,
}

impl ArcPolicy {
    /// Creates a policy with the given tuning.
    pub fn new(config: ArcConfig) -> Self {
        Self {
            t1: RecencyList::unbounded(),
            t2: RecencyList::unbounded(),
            b1: RecencyList::bounded(config.max_cache_size),
            b2: RecencyList::bounded(config.max_cache_size),
            freqs: FxHashMap::default(),
            p: 0.0,
            config,
            last_decay: Instant::now(),
        }
    }

    /// Current adaptive target for the recency side, in keys.
    pub fn recency_target(&self) -> f64 {
        self.p
    }

    fn maybe_decay(&mut self) {
        if self.last_decay.elapsed() < self.config.frequency_decay_interval {
            return;
        }
        self.last_decay = Instant::now();
        let factor = self.config.frequency_decay_factor;
        for count in self.freqs.values_mut() {
            *count = (*count as f64 * factor) as u64;
        }
    }

    fn grow_target(&mut self) {
        let max = self.config.max_cache_size as f64;
        self.p = (self.p + self.config.adaptive_learning_rate).min(max);
    }

    fn shrink_target(&mut self) {
        self.p = (self.p - self.config.adaptive_learning_rate).max(0.0);
    }
}

impl EvictionPolicy for ArcPolicy {
    fn record_insert(&mut self, key: &str) {
        self.maybe_decay();
        if self.t1.contains(key) || self.t2.contains(key) {
            self.record_access(key);
            return;
        }
        if self.b1.remove(key) {
            // The recency side evicted this too early.
            self.grow_target();
            self.t2.record(&key.to_owned());
            self.freqs
                .insert(key.to_owned(), self.config.frequency_threshold);
        } else if self.b2.remove(key) {
            self.shrink_target();
            self.t2.record(&key.to_owned());
            self.freqs
                .insert(key.to_owned(), self.config.frequency_threshold);
        } else {
            self.t1.record(&key.to_owned());
            self.freqs.insert(key.to_owned(), 1);
        }
    }

    fn record_access(&mut self, key: &str) {
        self.maybe_decay();
        if self.t2.touch(key) {
            if let Some(count) = self.freqs.get_mut(key) {
                *count = count.saturating_add(1);
            }
            return;
        }
        if self.t1.contains(key) {
            let count = self.freqs.entry(key.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
            if *count >= self.config.frequency_threshold {
                self.t1.remove(key);
                self.t2.record(&key.to_owned());
            } else {
                self.t1.touch(key);
            }
        }
    }

    fn record_remove(&mut self, key: &str) {
        self.t1.remove(key);
        self.t2.remove(key);
        self.b1.remove(key);
        self.b2.remove(key);
        self.freqs.remove(key);
    }

    fn pick_victim(&mut self) -> Option<String> {
        self.maybe_decay();
        let from_t1 =
            !self.t1.is_empty() && (self.t1.len() as f64 > self.p || self.t2.is_empty());
        let victim = if from_t1 {
            let key = self.t1.pop_oldest()?;
            self.b1.record(&key);
            key
        } else {
            let key = self.t2.pop_oldest()?;
            self.b2.record(&key);
            key
        };
        self.freqs.remove(&victim);
        Some(victim)
    }

    fn tick(&mut self) {
        self.maybe_decay();
    }

    fn clear(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.freqs.clear();
        self.p = 0.0;
        self.last_decay = Instant::now();
    }

    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn name(&self) -> &'static str {
        "arc"
    }
}
