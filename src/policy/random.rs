//! Uniform random eviction.
//!
//! Keys live in a vec with a position index; removal swap-removes, so both
//! tracking and victim selection stay O(1). Randomness comes from a small
//! xorshift generator seeded from the clock, which keeps the policy free of
//! external dependencies and deterministic under a fixed seed in tests.

use rustc_hash::FxHashMap;

use crate::policy::EvictionPolicy;

/// Evicts a uniformly random tracked key.
#[derive(Debug)]
pub struct RandomPolicy {
    keys: Vec<String>,
    positions: FxHashMap<String, usize>,
    rng: XorShift64,
}

impl Default for RandomPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomPolicy {
    /// Creates a policy seeded from the system clock.
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::with_seed(seed)
    }

    /// Creates a policy with a fixed seed (deterministic victim order).
    pub fn with_seed(seed: u64) -> Self {
        Self {
            keys: Vec::new(),
            positions: FxHashMap::default(),
            rng: XorShift64::new(seed),
        }
    }

    fn remove_at(&mut self, pos: usize) -> String {
        let key = self.keys.swap_remove(pos);
        self.positions.remove(&key);
        if let Some(moved) = self.keys.get(pos) {
            self.positions.insert(moved.clone(), pos);
        }
        key
    }
}

impl EvictionPolicy for RandomPolicy {
    fn record_insert(&mut self, key: &str) {
        if self.positions.contains_key(key) {
            return;
        }
        self.positions.insert(key.to_owned(), self.keys.len());
        self.keys.push(key.to_owned());
    }

    fn record_access(&mut self, _key: &str) {}

    fn record_remove(&mut self, key: &str) {
        if let Some(pos) = self.positions.get(key).copied() {
            self.remove_at(pos);
        }
    }

    fn pick_victim(&mut self) -> Option<String> {
        if self.keys.is_empty() {
            return None;
        }
        let pos = (self.rng.next() % self.keys.len() as u64) as usize;
        Some(self.remove_at(pos))
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.positions.clear();
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Minimal xorshift64 generator.
#[derive(Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9_7F4A_7C15 } else { seed },
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}
