//! Two-queue eviction.
//!
//! New keys enter a probationary FIFO; only keys accessed
//! `promotion_threshold` times graduate to the protected hot LRU. One-shot
//! scans therefore churn the probation queue without displacing the working
//! set. Victims drain probation first; hot keys are touched only when the
//! probation side is empty. Periodic decay shrinks hot access counts and
//! demotes keys that fall below the threshold back to probation.
//!
//! ```text
//!   insert ──► [ probation FIFO ] ──(nth access)──► [ hot LRU ]
//!                     │ victim first                     │ victim last
//!                     ▼                                  ▼
//! ```

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::ds::RecencyList;
use crate::policy::{EvictionPolicy, TwoQConfig};

/// 2Q with a probationary FIFO and a protected hot LRU.
#[derive(Debug)]
pub struct TwoQPolicy {
    probation: RecencyList<String>,
    hot: RecencyList<String>,
    accesses: FxHashMap<String, u64>,
    config: TwoQConfig,
    last_decay: Instant,
}

impl TwoQPolicy {
    /// Creates a policy with the given tuning.
    pub fn new(config: TwoQConfig) -> Self {
        Self {
            probation: RecencyList::unbounded(),
            hot: RecencyList::unbounded(),
            accesses: FxHashMap::default(),
            config,
            last_decay: Instant::now(),
        }
    }

    /// `true` if the key currently sits in the protected hot queue.
    pub fn is_hot(&self, key: &str) -> bool {
        self.hot.contains(key)
    }

    fn maybe_decay(&mut self) {
        if self.last_decay.elapsed() < self.config.hot_queue_decay_interval {
            return;
        }
        self.last_decay = Instant::now();
        let factor = self.config.hot_queue_decay_factor;
        let mut demoted = Vec::new();
        for (key, count) in self.accesses.iter_mut() {
            *count = (*count as f64 * factor) as u64;
            if *count < self.config.promotion_threshold && self.hot.contains(key.as_str()) {
                demoted.push(key.clone());
            }
        }
        for key in demoted {
            self.hot.remove(key.as_str());
            // Demoted keys rejoin probation at the old end so they are the
            // next candidates out.
            self.probation.record_oldest(&key);
        }
    }
}

impl EvictionPolicy for TwoQPolicy {
    fn record_insert(&mut self, key: &str) {
        self.maybe_decay();
        if self.hot.contains(key) || self.probation.contains(key) {
            self.record_access(key);
            return;
        }
        self.probation.record(&key.to_owned());
        self.accesses.insert(key.to_owned(), 1);
    }

    fn record_access(&mut self, key: &str) {
        self.maybe_decay();
        if self.hot.touch(key) {
            if let Some(count) = self.accesses.get_mut(key) {
                *count = count.saturating_add(1);
            }
            return;
        }
        if self.probation.contains(key) {
            let count = self.accesses.entry(key.to_owned()).or_insert(0);
            *count = count.saturating_add(1);
            if *count >= self.config.promotion_threshold {
                self.probation.remove(key);
                self.hot.record(&key.to_owned());
            }
        }
    }

    fn record_remove(&mut self, key: &str) {
        self.probation.remove(key);
        self.hot.remove(key);
        self.accesses.remove(key);
    }

    fn pick_victim(&mut self) -> Option<String> {
        self.maybe_decay();
        let victim = self
            .probation
            .pop_oldest()
            .or_else(|| self.hot.pop_oldest())?;
        self.accesses.remove(&victim);
        Some(victim)
    }

    fn tick(&mut self) {
        self.maybe_decay();
    }

    fn clear(&mut self) {
        self.probation.clear();
        self.hot.clear();
        self.accesses.clear();
        self.last_decay = Instant::now();
    }

    fn len(&self) -> usize {
        self.probation.len() + self.hot.len()
    }

    fn name(&self) -> &'static str {
        "two_q"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy() -> TwoQPolicy {
        TwoQPolicy::new(TwoQConfig::default())
    }

    #[test]
    fn scan_churns_probation_not_hot() {
        let mut p = policy();
        p.record_insert("hot");
        p.record_access("hot");
        assert!(p.is_hot("hot"));
        for i in 0..5 {
            p.record_insert(&format!("scan{i}"));
        }
        for i in 0..5 {
            assert_eq!(p.pick_victim(), Some(format!("scan{i}")));
        }
        assert_eq!(p.pick_victim().as_deref(), Some("hot"));
    }

    #[test]
    fn promotion_needs_threshold_accesses() {
        let mut p = TwoQPolicy::new(TwoQConfig {
            promotion_threshold: 3,
            ..TwoQConfig::default()
        });
        p.record_insert("a");
        p.record_access("a");
        assert!(!p.is_hot("a"));
        p.record_access("a");
        assert!(p.is_hot("a"));
    }

    #[test]
    fn decay_demotes_cooled_keys() {
        let mut p = TwoQPolicy::new(TwoQConfig {
            hot_queue_decay_interval: Duration::from_millis(20),
            hot_queue_decay_factor: 0.0,
            ..TwoQConfig::default()
        });
        p.record_insert("a");
        p.record_access("a");
        assert!(p.is_hot("a"));
        std::thread::sleep(Duration::from_millis(30));
        p.tick();
        assert!(!p.is_hot("a"));
        assert_eq!(p.len(), 1);
        assert_eq!(p.pick_victim().as_deref(), Some("a"));
    }

    #[test]
    fn remove_forgets_access_history() {
        let mut p = policy();
        p.record_insert("a");
        p.record_access("a");
        p.record_remove("a");
        assert!(p.is_empty());
        p.record_insert("a");
        assert!(!p.is_hot("a"));
    }
}
