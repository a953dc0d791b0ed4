//! Cache-wide configuration.
//!
//! Byte limits accept human-readable size strings (`"512KB"`, `"10MB"`).
//! Validation honors the same strict/sanitize split as the policy configs.

use std::time::Duration;

use crate::error::ConfigError;
use crate::map::SizeLimits;
use crate::policy::{PolicyConfig, ValidationMode};

/// Everything the cache core consumes at construction.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum resident item count, `None` for unlimited.
    pub max_items: Option<usize>,
    /// Maximum resident byte total, `None` for unlimited.
    pub max_bytes: Option<u64>,
    /// Eviction policy and its tuning.
    pub policy: PolicyConfig,
    /// Cache-wide default TTL. `None` disables expiry for entries without
    /// an override.
    pub ttl: Option<Duration>,
    /// When `true`, every read goes upstream and nothing is stored.
    pub bypass_cache: bool,
    /// How out-of-range tuning values are handled.
    pub validation: ValidationMode,
    /// Interval of the background maintenance task (TTL sweep and policy
    /// decay ticks).
    pub maintenance_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: None,
            max_bytes: None,
            policy: PolicyConfig::default(),
            ttl: None,
            bypass_cache: false,
            validation: ValidationMode::default(),
            maintenance_interval: Duration::from_secs(30),
        }
    }
}

impl CacheConfig {
    /// Validates the whole configuration under the configured mode.
    ///
    /// Sanitize mode never fails: zero limits are treated as unlimited
    /// (with a warning) and policy tuning is clamped into range.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.policy = self.policy.validated(self.validation)?;
        if self.max_items == Some(0) {
            match self.validation {
                ValidationMode::Strict => {
                    return Err(ConfigError::new("max_items: must be positive when set"));
                }
                ValidationMode::Sanitize => {
                    tracing::warn!("max_items of 0 treated as unlimited");
                    self.max_items = None;
                }
            }
        }
        if self.max_bytes == Some(0) {
            match self.validation {
                ValidationMode::Strict => {
                    return Err(ConfigError::new("max_bytes: must be positive when set"));
                }
                ValidationMode::Sanitize => {
                    tracing::warn!("max_bytes of 0 treated as unlimited");
                    self.max_bytes = None;
                }
            }
        }
        Ok(self)
    }

    /// The size limits this configuration imposes.
    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            max_items: self.max_items,
            max_bytes: self.max_bytes,
        }
    }
}

/// Parses a human-readable size string into bytes.
///
/// Accepts a decimal number with an optional `B`, `KB`, `MB`, or `GB`
/// suffix (case-insensitive, surrounding whitespace ignored). Units are
/// powers of 1024.
///
/// # Example
///
/// ```
/// use readthrough::config::parse_size;
///
/// assert_eq!(parse_size("512").unwrap(), 512);
/// assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
/// assert_eq!(parse_size("1.5 kb").unwrap(), 1536);
/// assert!(parse_size("10 parsecs").is_err());
/// ```
pub fn parse_size(input: &str) -> Result<u64, ConfigError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ConfigError::new(format!("unparseable size: {input:?}")))?;
    if value < 0.0 || !value.is_finite() {
        return Err(ConfigError::new(format!("negative or non-finite size: {input:?}")));
    }
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        other => {
            return Err(ConfigError::new(format!("unknown size unit: {other:?}")));
        }
    };
    Ok((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_suffixed_sizes() {
        assert_eq!(parse_size("0").unwrap(), 0);
        assert_eq!(parse_size("123").unwrap(), 123);
        assert_eq!(parse_size("2KB").unwrap(), 2048);
        assert_eq!(parse_size("10MB").unwrap(), 10 * 1024 * 1024);
        assert_eq!(parse_size("1GB").unwrap(), 1024 * 1024 * 1024);
        assert_eq!(parse_size(" 4 kb ").unwrap(), 4096);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MB").is_err());
        assert!(parse_size("-5MB").is_err());
        assert!(parse_size("10TB").is_err());
    }

    #[test]
    fn zero_limits_fail_validation() {
        let err = CacheConfig {
            max_items: Some(0),
            ..CacheConfig::default()
        }
        .validated()
        .unwrap_err();
        assert!(err.message().contains("max_items"));
    }

    #[test]
    fn default_config_is_valid() {
        assert!(CacheConfig::default().validated().is_ok());
    }
}
