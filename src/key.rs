//! Structured item keys and their canonical normalization.
//!
//! Cached values are addressed by an [`ItemKey`]: a primary id of some kind
//! (`user:42`), optionally nested under an ordered chain of location ids
//! (`comment:7` inside `post:3` inside `blog:1`). Ids may arrive as numbers
//! or strings; the two forms of the same logical id must compare equal, so
//! every storage lookup, delete, and query-membership check goes through one
//! canonical textual form first.
//!
//! ## Architecture
//!
//! ```text
//!   ItemKey::Primary { kind: "user", id: 42 }
//!        │ normalize()
//!        ▼
//!   NormalizedKey("item:user:42")
//!        │ parse()
//!        ▼
//!   ItemKey::Primary { kind: "user", id: Int(42) }
//!
//!   ItemKey::Composite { kind: "comment", id: "7",
//!                        location: [blog:1, post:3] }
//!        │ normalize()
//!        ▼
//!   NormalizedKey("item:comment:7@blog:1/post:3")
//! ```
//!
//! ## Behavior
//!
//! - `ItemId::Int(42)` and `ItemId::Text("42")` normalize identically.
//! - Composite location chains normalize segment by segment, in order,
//!   outermost first.
//! - Separator characters inside kinds and ids (`:`, `/`, `@`, `\`) are
//!   backslash-escaped, so normalization is injective over logical keys.
//! - [`NormalizedKey::parse`] round-trips back to an `ItemKey`. Failure to
//!   parse a recorded eviction candidate is the "eviction key corruption"
//!   case handled (log + skip) by the eviction manager.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// A single id, as supplied by the caller.
///
/// Numeric and textual forms of the same id are logically equal; equality is
/// defined through [`ItemId::canonical`], not through the derived `Eq`.
///
/// # Example
///
/// ```
/// use readthrough::key::ItemId;
///
/// assert_eq!(ItemId::Int(42).canonical(), ItemId::from("42").canonical());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    /// Numeric id.
    Int(i64),
    /// Textual id.
    Text(String),
}

impl ItemId {
    /// Returns the canonical textual form of this id.
    pub fn canonical(&self) -> String {
        match self {
            ItemId::Int(n) => n.to_string(),
            ItemId::Text(s) => s.clone(),
        }
    }

    /// Returns `true` if the id has no content at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, ItemId::Text(s) if s.is_empty())
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Int(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Text(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Text(s)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{n}"),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

/// One segment of a composite key's location chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRef {
    /// Kind of the containing resource (e.g. `"post"`).
    pub kind: String,
    /// Id of the containing resource.
    pub id: ItemId,
}

impl LocationRef {
    /// Creates a location segment.
    pub fn new(kind: impl Into<String>, id: impl Into<ItemId>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Structured identifier for a cached value.
///
/// Either a plain primary key, or a composite key nested under an ordered
/// chain of location ids (outermost to innermost).
///
/// # Example
///
/// ```
/// use readthrough::key::{ItemKey, LocationRef};
///
/// let user = ItemKey::primary("user", 42);
/// let comment = ItemKey::composite(
///     "comment",
///     7,
///     vec![LocationRef::new("blog", 1), LocationRef::new("post", 3)],
/// );
///
/// assert_eq!(user.normalize().as_str(), "item:user:42");
/// assert_eq!(comment.normalize().as_str(), "item:comment:7@blog:1/post:3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "key_type", rename_all = "snake_case")]
pub enum ItemKey {
    /// A top-level key: a kind plus a primary id.
    Primary {
        /// Item kind (e.g. `"user"`).
        kind: String,
        /// Primary id.
        id: ItemId,
    },
    /// A key nested under a non-empty chain of locations.
    Composite {
        /// Item kind (e.g. `"comment"`).
        kind: String,
        /// Primary id within the innermost location.
        id: ItemId,
        /// Containment chain, outermost first. Never empty for a valid key.
        location: Vec<LocationRef>,
    },
}

impl ItemKey {
    /// Creates a primary key.
    pub fn primary(kind: impl Into<String>, id: impl Into<ItemId>) -> Self {
        ItemKey::Primary {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a composite key with the given location chain.
    pub fn composite(
        kind: impl Into<String>,
        id: impl Into<ItemId>,
        location: Vec<LocationRef>,
    ) -> Self {
        ItemKey::Composite {
            kind: kind.into(),
            id: id.into(),
            location,
        }
    }

    /// Returns the item kind.
    pub fn kind(&self) -> &str {
        match self {
            ItemKey::Primary { kind, .. } | ItemKey::Composite { kind, .. } => kind,
        }
    }

    /// Returns the primary id.
    pub fn id(&self) -> &ItemId {
        match self {
            ItemKey::Primary { id, .. } | ItemKey::Composite { id, .. } => id,
        }
    }

    /// Returns the location chain (empty for primary keys).
    pub fn location(&self) -> &[LocationRef] {
        match self {
            ItemKey::Primary { .. } => &[],
            ItemKey::Composite { location, .. } => location,
        }
    }

    /// Validates the key.
    ///
    /// Fails fast, before any I/O, on an empty kind, an empty id, an empty
    /// location chain on a composite key, or a malformed location segment.
    ///
    /// # Example
    ///
    /// ```
    /// use readthrough::key::ItemKey;
    ///
    /// assert!(ItemKey::primary("user", 42).validate().is_ok());
    /// assert!(ItemKey::primary("", 42).validate().is_err());
    /// assert!(ItemKey::composite("comment", 7, vec![]).validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.kind().is_empty() {
            return Err(CacheError::InvalidKey("empty kind".into()));
        }
        if self.id().is_empty() {
            return Err(CacheError::InvalidKey("empty id".into()));
        }
        if let ItemKey::Composite { location, .. } = self {
            if location.is_empty() {
                return Err(CacheError::InvalidKey(
                    "composite key with empty location chain".into(),
                ));
            }
            for seg in location {
                if seg.kind.is_empty() {
                    return Err(CacheError::InvalidKey("location segment with empty kind".into()));
                }
                if seg.id.is_empty() {
                    return Err(CacheError::InvalidKey("location segment with empty id".into()));
                }
            }
        }
        Ok(())
    }

    /// Produces the canonical normalized form of this key.
    ///
    /// Deterministic: numeric and string forms of the same id map to the same
    /// `NormalizedKey`, and composite location segments normalize in order.
    pub fn normalize(&self) -> NormalizedKey {
        let mut out = String::with_capacity(32);
        out.push_str("item:");
        escape_into(self.kind(), &mut out);
        out.push(':');
        escape_into(&self.id().canonical(), &mut out);
        let location = self.location();
        if !location.is_empty() {
            out.push('@');
            for (i, seg) in location.iter().enumerate() {
                if i > 0 {
                    out.push('/');
                }
                escape_into(&seg.kind, &mut out);
                out.push(':');
                escape_into(&seg.id.canonical(), &mut out);
            }
        }
        NormalizedKey(out)
    }
}

/// Canonical string form of an [`ItemKey`].
///
/// Identity for every storage lookup, delete, eviction record, and
/// query-membership check. Two item keys are logically equal iff their
/// normalized forms are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    /// Wraps an already-canonical string.
    ///
    /// Intended for replaying recorded keys (eviction candidates); anything
    /// that did not come from [`ItemKey::normalize`] may fail to
    /// [`parse`](Self::parse) later.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the canonical string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwraps into the canonical string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Parses the canonical form back into an [`ItemKey`].
    ///
    /// All-digit ids (with optional leading minus) come back numeric; every
    /// other id comes back textual. The two forms are logically equal, so the
    /// round-trip preserves key identity even when it does not preserve the
    /// original representation.
    ///
    /// # Example
    ///
    /// ```
    /// use readthrough::key::{ItemKey, NormalizedKey};
    ///
    /// let key = ItemKey::primary("user", "42");
    /// let back = key.normalize().parse().unwrap();
    /// assert_eq!(back.normalize(), key.normalize());
    ///
    /// assert!(NormalizedKey::from_raw("garbage").parse().is_err());
    /// ```
    pub fn parse(&self) -> Result<ItemKey, CacheError> {
        let rest = self
            .0
            .strip_prefix("item:")
            .ok_or_else(|| CacheError::InvalidKey(format!("missing item prefix: {}", self.0)))?;

        let (head, tail) = split_once_unescaped(rest, '@');
        let head_parts = split_unescaped(head, ':');
        if head_parts.len() != 2 {
            return Err(CacheError::InvalidKey(format!("malformed key head: {}", self.0)));
        }
        let kind = unescape(&head_parts[0]);
        let id = parse_id(&unescape(&head_parts[1]));
        if kind.is_empty() {
            return Err(CacheError::InvalidKey(format!("empty kind in: {}", self.0)));
        }

        match tail {
            None => Ok(ItemKey::Primary { kind, id }),
            Some(chain) => {
                let mut location = Vec::new();
                for seg in split_unescaped(chain, '/') {
                    let parts = split_unescaped(&seg, ':');
                    if parts.len() != 2 {
                        return Err(CacheError::InvalidKey(format!(
                            "malformed location segment in: {}",
                            self.0
                        )));
                    }
                    location.push(LocationRef {
                        kind: unescape(&parts[0]),
                        id: parse_id(&unescape(&parts[1])),
                    });
                }
                if location.is_empty() {
                    return Err(CacheError::InvalidKey(format!(
                        "empty location chain in: {}",
                        self.0
                    )));
                }
                Ok(ItemKey::Composite { kind, id, location })
            },
        }
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalizes a location scope for fingerprinting.
///
/// An empty scope canonicalizes to `"-"` so it cannot collide with any real
/// chain.
pub fn normalize_scope(locations: &[LocationRef]) -> String {
    if locations.is_empty() {
        return "-".to_string();
    }
    let mut out = String::new();
    for (i, seg) in locations.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        escape_into(&seg.kind, &mut out);
        out.push(':');
        escape_into(&seg.id.canonical(), &mut out);
    }
    out
}

/// Returns `true` if two location chains are exactly equal after
/// normalization (no prefix matching).
pub fn scope_eq(a: &[LocationRef], b: &[LocationRef]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            x.kind == y.kind && x.id.canonical() == y.id.canonical()
        })
}

fn parse_id(s: &str) -> ItemId {
    let numeric = !s.is_empty()
        && s.strip_prefix('-').unwrap_or(s).chars().all(|c| c.is_ascii_digit())
        && !s.strip_prefix('-').unwrap_or(s).is_empty();
    if numeric {
        if let Ok(n) = s.parse::<i64>() {
            return ItemId::Int(n);
        }
    }
    ItemId::Text(s.to_string())
}

fn escape_into(s: &str, out: &mut String) {
    for c in s.chars() {
        if matches!(c, '\\' | ':' | '/' | '@') {
            out.push('\\');
        }
        out.push(c);
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Splits on every unescaped occurrence of `sep`, keeping escapes intact.
fn split_unescaped(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == sep {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    parts.push(current);
    parts
}

/// Splits at the first unescaped occurrence of `sep`, if any.
fn split_once_unescaped(s: &str, sep: char) -> (&str, Option<&str>) {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 2;
        } else if bytes[i] == sep as u8 {
            return (&s[..i], Some(&s[i + 1..]));
        } else {
            i += 1;
        }
    }
    (s, None)
}
