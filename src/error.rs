//! Error types for the readthrough cache.
//!
//! ## Key Components
//!
//! - [`CacheError`]: The error type surfaced by cache operations. All variants
//!   are `Clone` because a single upstream failure fans out to every caller
//!   waiting on the same in-flight fetch.
//! - [`SourceError`]: An upstream data-source failure. "Not found" is never an
//!   error; sources report absence as `Ok(None)` / an empty result.
//! - [`ConfigError`]: Returned by strict-mode construction when an eviction or
//!   TTL parameter is out of range.
//!
//! ## Example Usage
//!
//! ```
//! use readthrough::error::ConfigError;
//! use readthrough::policy::{LfuConfig, ValidationMode};
//!
//! // Strict mode rejects an out-of-range decay factor without panicking.
//! let bad = LfuConfig {
//!     decay_factor: 2.0,
//!     ..LfuConfig::default()
//! };
//! let err: ConfigError = bad.validated(ValidationMode::Strict).unwrap_err();
//! assert!(err.to_string().contains("decay_factor"));
//! ```

use thiserror::Error;

/// Error surfaced by cache operations.
///
/// Invalid keys fail synchronously before any I/O is attempted. Source errors
/// propagate unchanged and leave the cache exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The key was malformed or incomplete. Raised before any I/O.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The upstream source failed for a reason other than absence.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// A configuration parameter was out of range (strict mode only).
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Error reported by the upstream data source.
///
/// Carries a human-readable description. Cloneable so a single failure can be
/// delivered to every caller coalesced onto the same in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("source error: {message}")]
pub struct SourceError {
    message: String,
}

impl SourceError {
    /// Creates a new `SourceError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Error returned when cache configuration parameters are invalid.
///
/// Produced by strict-mode validation of policy tunables, size strings, and
/// builder `try_build()` methods. Sanitize-mode construction never returns
/// this; out-of-range values are clamped and a warning is logged instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    /// Creates a new `ConfigError` with the given description.
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }

    /// Returns the error description.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}
