//! Eviction policies and their configuration.
//!
//! Every policy implements [`EvictionPolicy`] over opaque normalized key
//! strings: the policy orders keys and nominates victims, while the
//! [`EvictionManager`](crate::eviction::EvictionManager) owns limits, size
//! accounting, and the actual removal. Policies never touch stored values.
//!
//! ## Policy family
//!
//! ```text
//!   ┌─────────┬────────────────────────────────────────────────┐
//!   │ lru     │ evict least recently used                      │
//!   │ fifo    │ evict oldest inserted, accesses ignored        │
//!   │ mru     │ evict most recently used                       │
//!   │ random  │ evict uniformly at random                      │
//!   │ lfu     │ evict lowest estimated frequency (sketch)      │
//!   │ arc     │ recency/frequency split with adaptive target   │
//!   │ two_q   │ probation FIFO + protected hot LRU             │
//!   └─────────┴────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use crate::error::ConfigError;

mod arc;
mod fifo;
mod lfu;
mod lru;
mod mru;
mod random;
mod two_q;

pub use arc::ArcPolicy;
pub use fifo::FifoPolicy;
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use mru::MruPolicy;
pub use random::RandomPolicy;
pub use two_q::TwoQPolicy;

/// Ordering and victim selection over normalized keys.
///
/// Implementations are synchronous and single-threaded; the manager
/// serializes access.
pub trait EvictionPolicy: Send {
    /// Records that `key` was inserted (or overwritten).
    fn record_insert(&mut self, key: &str);

    /// Records a read of `key`. Unknown keys are ignored.
    fn record_access(&mut self, key: &str);

    /// Forgets `key` without counting it as an eviction.
    fn record_remove(&mut self, key: &str);

    /// Nominates the next key to evict, or `None` when empty. The caller
    /// must follow up with [`record_remove`](Self::record_remove) once the
    /// key is actually gone.
    fn pick_victim(&mut self) -> Option<String>;

    /// Periodic maintenance hook (frequency decay and the like). Policies
    /// without time-based state ignore it.
    fn tick(&mut self) {}

    /// Drops all tracked state.
    fn clear(&mut self);

    /// Number of keys currently tracked.
    fn len(&self) -> usize;

    /// `true` when no keys are tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short policy name for logs.
    fn name(&self) -> &'static str;
}

/// What to do with an out-of-range configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    /// Reject the configuration with a [`ConfigError`].
    #[default]
    Strict,
    /// Clamp the value into range and log a warning.
    Sanitize,
}

/// Policy selection plus per-policy tuning.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PolicyConfig {
    /// Least recently used.
    #[default]
    Lru,
    /// First in, first out.
    Fifo,
    /// Most recently used.
    Mru,
    /// Uniform random.
    Random,
    /// Frequency sketch.
    Lfu(LfuConfig),
    /// Adaptive replacement.
    Arc(ArcConfig),
    /// Two-queue.
    TwoQ(TwoQConfig),
}

impl PolicyConfig {
    /// Validates nested tuning parameters, applying `mode` to violations.
    pub fn validated(self, mode: ValidationMode) -> Result<Self, ConfigError> {
        Ok(match self {
            Self::Lfu(cfg) => Self::Lfu(cfg.validated(mode)?),
            Self::Arc(cfg) => Self::Arc(cfg.validated(mode)?),
            Self::TwoQ(cfg) => Self::TwoQ(cfg.validated(mode)?),
            other => other,
        })
    }

    /// Builds the policy this configuration describes.
    pub fn build(&self) -> Box<dyn EvictionPolicy> {
        match self {
            Self::Lru => Box::new(LruPolicy::new()),
            Self::Fifo => Box::new(FifoPolicy::new()),
            Self::Mru => Box::new(MruPolicy::new()),
            Self::Random => Box::new(RandomPolicy::new()),
            Self::Lfu(cfg) => Box::new(LfuPolicy::new(cfg.clone())),
            Self::Arc(cfg) => Box::new(ArcPolicy::new(cfg.clone())),
            Self::TwoQ(cfg) => Box::new(TwoQPolicy::new(cfg.clone())),
        }
    }

    /// Short name of the selected policy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Fifo => "fifo",
            Self::Mru => "mru",
            Self::Random => "random",
            Self::Lfu(_) => "lfu",
            Self::Arc(_) => "arc",
            Self::TwoQ(_) => "two_q",
        }
    }
}

fn violation(mode: ValidationMode, field: &str, detail: String) -> Result<(), ConfigError> {
    match mode {
        ValidationMode::Strict => Err(ConfigError::new(format!("{field}: {detail}"))),
        ValidationMode::Sanitize => {
            tracing::warn!(field, %detail, "sanitized out-of-range config value");
            Ok(())
        }
    }
}

fn clamp_f64(
    mode: ValidationMode,
    field: &str,
    value: f64,
    lo: f64,
    hi: f64,
) -> Result<f64, ConfigError> {
    if value.is_finite() && (lo..=hi).contains(&value) {
        return Ok(value);
    }
    violation(mode, field, format!("{value} outside [{lo}, {hi}]"))?;
    Ok(if value.is_finite() { value.clamp(lo, hi) } else { lo })
}

fn at_least(
    mode: ValidationMode,
    field: &str,
    value: usize,
    min: usize,
) -> Result<usize, ConfigError> {
    if value >= min {
        return Ok(value);
    }
    violation(mode, field, format!("{value} below minimum {min}"))?;
    Ok(min)
}

fn positive_interval(
    mode: ValidationMode,
    field: &str,
    value: Duration,
    fallback: Duration,
) -> Result<Duration, ConfigError> {
    if value > Duration::ZERO {
        return Ok(value);
    }
    violation(mode, field, format!("{value:?} is not a positive interval"))?;
    Ok(fallback)
}

fn in_range(
    mode: ValidationMode,
    field: &str,
    value: usize,
    lo: usize,
    hi: usize,
) -> Result<usize, ConfigError> {
    if (lo..=hi).contains(&value) {
        return Ok(value);
    }
    violation(mode, field, format!("{value} outside [{lo}, {hi}]"))?;
    Ok(value.clamp(lo, hi))
}

/// Tuning for [`LfuPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct LfuConfig {
    /// Multiplier applied to all sketch counters on decay. Range `[0, 1]`,
    /// default `0.5`.
    pub decay_factor: f64,
    /// How often decay runs. Default 60 seconds.
    pub decay_interval: Duration,
    /// Sketch columns per row. Range `[16, 65536]`, default `1024`.
    pub sketch_width: usize,
    /// Sketch rows. Range `[1, 16]`, default `4`.
    pub sketch_depth: usize,
    /// Initial frequency credited to fresh inserts so brand-new items are
    /// not immediate victims. Minimum `1`, default `1`.
    pub min_frequency_threshold: u64,
}

impl Default for LfuConfig {
    fn default() -> Self {
        Self {
            decay_factor: 0.5,
            decay_interval: Duration::from_secs(60),
            sketch_width: 1024,
            sketch_depth: 4,
            min_frequency_threshold: 1,
        }
    }
}

impl LfuConfig {
    /// Validates tuning parameters, applying `mode` to violations.
    pub fn validated(mut self, mode: ValidationMode) -> Result<Self, ConfigError> {
        self.decay_factor = clamp_f64(mode, "decay_factor", self.decay_factor, 0.0, 1.0)?;
        self.decay_interval = positive_interval(
            mode,
            "decay_interval",
            self.decay_interval,
            Duration::from_secs(60),
        )?;
        self.sketch_width = in_range(mode, "sketch_width", self.sketch_width, 16, 65536)?;
        self.sketch_depth = in_range(mode, "sketch_depth", self.sketch_depth, 1, 16)?;
        if self.min_frequency_threshold < 1 {
            violation(
                mode,
                "min_frequency_threshold",
                format!("{} below minimum 1", self.min_frequency_threshold),
            )?;
            self.min_frequency_threshold = 1;
        }
        Ok(self)
    }
}

/// Tuning for [`ArcPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct ArcConfig {
    /// Capacity the recency/frequency split is computed against. Must be
    /// positive. Default `1000`.
    pub max_cache_size: usize,
    /// Accesses before an entry is treated as frequent. Minimum `1`,
    /// default `2`.
    pub frequency_threshold: u64,
    /// Multiplier applied to access counts on decay. Range `[0, 1]`,
    /// default `0.5`.
    pub frequency_decay_factor: f64,
    /// How often frequency decay runs. Default 60 seconds.
    pub frequency_decay_interval: Duration,
    /// Step size for the adaptive target on ghost hits. Range `[0, 10]`,
    /// default `1.0`.
    pub adaptive_learning_rate: f64,
}

impl Default for ArcConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 1000,
            frequency_threshold: 2,
            frequency_decay_factor: 0.5,
            frequency_decay_interval: Duration::from_secs(60),
            adaptive_learning_rate: 1.0,
        }
    }
}

impl ArcConfig {
    /// Validates tuning parameters, applying `mode` to violations.
    pub fn validated(mut self, mode: ValidationMode) -> Result<Self, ConfigError> {
        self.max_cache_size = at_least(mode, "max_cache_size", self.max_cache_size, 1)?;
        if self.frequency_threshold < 1 {
            violation(
                mode,
                "frequency_threshold",
                format!("{} below minimum 1", self.frequency_threshold),
            )?;
            self.frequency_threshold = 1;
        }
        self.frequency_decay_factor = clamp_f64(
            mode,
            "frequency_decay_factor",
            self.frequency_decay_factor,
            0.0,
            1.0,
        )?;
        self.frequency_decay_interval = positive_interval(
            mode,
            "frequency_decay_interval",
            self.frequency_decay_interval,
            Duration::from_secs(60),
        )?;
        self.adaptive_learning_rate = clamp_f64(
            mode,
            "adaptive_learning_rate",
            self.adaptive_learning_rate,
            0.0,
            10.0,
        )?;
        Ok(self)
    }
}

/// Tuning for [`TwoQPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub struct TwoQConfig {
    /// Capacity the probation/hot split is computed against. Must be
    /// positive. Default `1000`.
    pub max_cache_size: usize,
    /// Accesses before a probationary entry is promoted to the hot queue.
    /// Minimum `1`, default `2`.
    pub promotion_threshold: u64,
    /// Multiplier applied to hot access counts on decay. Range `[0, 1]`,
    /// default `0.5`.
    pub hot_queue_decay_factor: f64,
    /// How often hot-queue decay runs. Default 60 seconds.
    pub hot_queue_decay_interval: Duration,
}

impl Default for TwoQConfig {
    fn default() -> Self {
        Self {
            max_cache_size: 1000,
            promotion_threshold: 2,
            hot_queue_decay_factor: 0.5,
            hot_queue_decay_interval: Duration::from_secs(60),
        }
    }
}

impl TwoQConfig {
    /// Validates tuning parameters, applying `mode` to violations.
    pub fn validated(mut self, mode: ValidationMode) -> Result<Self, ConfigError> {
        self.max_cache_size = at_least(mode, "max_cache_size", self.max_cache_size, 1)?;
        if self.promotion_threshold < 1 {
            violation(
                mode,
                "promotion_threshold",
                format!("{} below minimum 1", self.promotion_threshold),
            )?;
            self.promotion_threshold = 1;
        }
        self.hot_queue_decay_factor = clamp_f64(
            mode,
            "hot_queue_decay_factor",
            self.hot_queue_decay_factor,
            0.0,
            1.0,
        )?;
        self.hot_queue_decay_interval = positive_interval(
            mode,
            "hot_queue_decay_interval",
            self.hot_queue_decay_interval,
            Duration::from_secs(60),
        )?;
        Ok(self)
    }
}
