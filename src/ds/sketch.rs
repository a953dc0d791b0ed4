//! Count-min sketch with multiplicative decay.
//!
//! Approximate frequency counting for the LFU policy: a `width × depth` grid
//! of counters, each key hashed to one counter per row, estimate = minimum
//! across rows. Collisions only ever inflate an estimate, never deflate it.
//!
//! Decay multiplies every counter by a factor in `[0, 1]`, so frequency is a
//! recency-weighted measure rather than an all-time total: an item hammered
//! long ago and idle since loses its standing to an item accessed moderately
//! but consistently.
//!
//! ```text
//!        width counters per row
//!   row 0  [ 3 ][ 0 ][ 7 ][ 1 ] ...   h0(k) ──► column
//!   row 1  [ 1 ][ 5 ][ 2 ][ 9 ] ...   h1(k) ──► column
//!   row 2  [ 4 ][ 2 ][ 6 ][ 0 ] ...   h2(k) ──► column
//!                                     estimate(k) = min over rows
//! ```

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Approximate frequency counter over hashed keys.
#[derive(Debug)]
pub struct CountMinSketch {
    width: usize,
    depth: usize,
    counters: Vec<u64>,
}

impl CountMinSketch {
    /// Creates a sketch with `width` counters per row and `depth` rows.
    ///
    /// Both dimensions are assumed pre-validated by the policy config.
    pub fn new(width: usize, depth: usize) -> Self {
        Self {
            width,
            depth,
            counters: vec![0; width * depth],
        }
    }

    /// Returns the configured width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the configured depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Adds `amount` to the counters for `key`.
    pub fn add<K: Hash + ?Sized>(&mut self, key: &K, amount: u64) {
        for row in 0..self.depth {
            let col = self.column(key, row);
            let cell = &mut self.counters[row * self.width + col];
            *cell = cell.saturating_add(amount);
        }
    }

    /// Increments the counters for `key` by one.
    pub fn increment<K: Hash + ?Sized>(&mut self, key: &K) {
        self.add(key, 1);
    }

    /// Returns the estimated count for `key` (never an undercount).
    pub fn estimate<K: Hash + ?Sized>(&self, key: &K) -> u64 {
        (0..self.depth)
            .map(|row| self.counters[row * self.width + self.column(key, row)])
            .min()
            .unwrap_or(0)
    }

    /// Multiplies every counter by `factor` (clamped to `[0, 1]`), rounding
    /// down. A factor of `0` resets the sketch; `1` is a no-op.
    pub fn decay(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);
        for cell in &mut self.counters {
            *cell = (*cell as f64 * factor) as u64;
        }
    }

    /// Resets every counter to zero.
    pub fn clear(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = 0);
    }

    /// Hashes `key` into a column for `row`, with the row index salting the
    /// hash so rows see independent collisions.
    fn column<K: Hash + ?Sized>(&self, key: &K, row: usize) -> usize {
        let mut hasher = FxHasher::default();
        row.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.width
    }
}
