//! Least-frequently-used eviction over a count-min sketch.
//!
//! Frequencies are estimated, not exact: a fixed-size [`CountMinSketch`]
//! absorbs access counts in O(1) space regardless of how many keys pass
//! through. Resident keys sit in a recency list so victim selection can
//! tie-break toward the oldest key, and periodic decay halves all counters
//! so yesterday's hot key cannot squat in the cache forever.
//!
//! Fresh inserts are credited `min_frequency_threshold` so a key admitted a
//! moment ago is not immediately the minimum.

use std::time::Instant;

use crate::ds::{CountMinSketch, RecencyList};
use crate::policy::{EvictionPolicy, LfuConfig};

/// Approximate LFU with frequency decay.
#[derive(Debug)]
pub struct LfuPolicy {
    sketch: CountMinSketch,
    resident: RecencyList<String>,
    config: LfuConfig,
    last_decay: Instant,
}

impl LfuPolicy {
    /// Creates a policy with the given tuning.
    pub fn new(config: LfuConfig) -> Self {
        Self {
            sketch: CountMinSketch::new(config.sketch_width, config.sketch_depth),
            resident: RecencyList::unbounded(),
            config,
            last_decay: Instant::now(),
        }
    }

    /// Estimated access frequency of a key.
    pub fn frequency(&self, key: &str) -> u64 {
        self.sketch.estimate(key)
    }

    fn maybe_decay(&mut self) {
        if self.last_decay.elapsed() >= self.config.decay_interval {
            self.sketch.decay(self.config.decay_factor);
            self.last_decay = Instant::now();
        }
    }
}

impl EvictionPolicy for LfuPolicy {
    fn record_insert(&mut self, key: &str) {
        self.maybe_decay();
        if !self.resident.contains(key) {
            self.sketch
                .add(key, self.config.min_frequency_threshold);
        }
        self.resident.record(&key.to_owned());
    }

    fn record_access(&mut self, key: &str) {
        self.maybe_decay();
        if self.resident.touch(key) {
            self.sketch.increment(key);
        }
    }

    fn record_remove(&mut self, key: &str) {
        self.resident.remove(key);
    }

    fn pick_victim(&mut self) -> Option<String> {
        self.maybe_decay();
        // Oldest-first scan with strict comparison keeps ties on the
        // oldest key.
        let mut victim: Option<(String, u64)> = None;
        for key in self.resident.iter().collect::<Vec<_>>().into_iter().rev() {
            let freq = self.sketch.estimate(key);
            match &victim {
                Some((_, best)) if freq >= *best => {}
                _ => victim = Some((key.clone(), freq)),
            }
        }
        let (key, _) = victim?;
        self.resident.remove(key.as_str());
        Some(key)
    }

    fn tick(&mut self) {
        self.maybe_decay();
    }

    fn clear(&mut self) {
        self.sketch.clear();
        self.resident.clear();
        self.last_decay = Instant::now();
    }

    fn len(&self) -> usize {
        self.resident.len()
    }

    fn name(&self) -> &'static str {
        "lfu"
    }
}
