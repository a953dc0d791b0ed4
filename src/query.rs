//! Query predicates, facets, and deterministic fingerprints.
//!
//! A query-result cache entry is addressed by a [`QueryFingerprint`]: a
//! SHA-256 digest over the item kind, the canonicalized predicate, the
//! normalized location scope, and the facet identity. Field order never
//! matters; predicates canonicalize through a stable sort before hashing, so
//! `{a: 1, b: 2}` and `{b: 2, a: 1}` collide on purpose.
//!
//! The [`Facet`] is the completeness identity: a full, unfiltered enumeration
//! and a named partial view over the same scope must never share a
//! fingerprint, otherwise a partial result could satisfy a complete query
//! (the cache-poisoning case the query layer is built to prevent).
//!
//! ## Fingerprint input layout
//!
//! ```text
//!   query:{kind}:{facet}:{canonical predicate}@{normalized scope}
//!           │       │            │                     │
//!           │       │            │                     └ "-" for empty scope
//!           │       │            └ JSON, object keys sorted recursively
//!           │       └ "complete" | "facet:<name>"
//!           └ item kind, escaped
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::key::{normalize_scope, LocationRef};

/// A query predicate: a set of field constraints that an item must match.
///
/// Fields are kept in a `BTreeMap`, so iteration (and therefore
/// canonicalization) is stable regardless of insertion order.
///
/// # Example
///
/// ```
/// use readthrough::query::Query;
/// use serde_json::json;
///
/// let a = Query::new().field("status", json!("open")).field("author", json!(7));
/// let b = Query::new().field("author", json!(7)).field("status", json!("open"));
/// assert_eq!(a.canonical(), b.canonical());
///
/// assert!(Query::new().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    fields: BTreeMap<String, Value>,
}

impl Query {
    /// Creates an empty (match-everything) predicate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field constraint, consuming and returning the query.
    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Returns `true` if the predicate has no constraints.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Canonical textual form with stable field order.
    pub fn canonical(&self) -> String {
        let mut out = String::from("{");
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&serde_json::to_string(k).expect("string serializes"));
            out.push(':');
            canonical_json(v, &mut out);
        }
        out.push('}');
        out
    }

    /// Checks whether a value matches every field constraint.
    ///
    /// The value is serialized to JSON and each constrained field is compared
    /// for equality. A value that fails to serialize, or is not a JSON
    /// object, matches only the empty predicate.
    ///
    /// # Example
    ///
    /// ```
    /// use readthrough::query::Query;
    /// use serde_json::json;
    ///
    /// let q = Query::new().field("status", json!("open"));
    /// assert!(q.matches(&json!({"status": "open", "title": "x"})));
    /// assert!(!q.matches(&json!({"status": "closed"})));
    /// assert!(Query::new().matches(&json!(3)));
    /// ```
    pub fn matches<V: Serialize>(&self, value: &V) -> bool {
        if self.is_empty() {
            return true;
        }
        let json = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let obj = match json.as_object() {
            Some(o) => o,
            None => return false,
        };
        self.fields
            .iter()
            .all(|(name, want)| obj.get(name) == Some(want))
    }
}

/// Facet identity of a query: the completeness dimension of a fingerprint.
///
/// `Complete` marks a full, unfiltered enumeration of a scope. `Named` marks
/// a partial view (an explicit sub-filter or named projection). The two can
/// never produce the same fingerprint, even over an identical predicate and
/// scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Facet {
    /// Full, unfiltered enumeration.
    Complete,
    /// Named partial view.
    Named(String),
}

impl Facet {
    /// Canonical tag used in fingerprint input.
    ///
    /// Named facets carry a `facet:` prefix, so no name can collide with the
    /// `complete` tag.
    pub fn tag(&self) -> String {
        match self {
            Facet::Complete => "complete".to_string(),
            Facet::Named(name) => format!("facet:{name}"),
        }
    }

    /// Returns `true` for the complete/unfiltered facet.
    pub fn is_complete(&self) -> bool {
        matches!(self, Facet::Complete)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

/// Deterministic identity of a query's kind, predicate, scope, and facet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryFingerprint(String);

impl QueryFingerprint {
    /// Computes the fingerprint for a query over a kind and scope.
    ///
    /// Stable under predicate field reordering and under numeric-vs-string id
    /// forms in the location scope.
    ///
    /// # Example
    ///
    /// ```
    /// use readthrough::key::LocationRef;
    /// use readthrough::query::{Facet, Query, QueryFingerprint};
    /// use serde_json::json;
    ///
    /// let scope = vec![LocationRef::new("post", 3)];
    /// let scope_str = vec![LocationRef::new("post", "3")];
    ///
    /// let a = QueryFingerprint::compute("comment", &Query::new(), &scope, &Facet::Complete);
    /// let b = QueryFingerprint::compute("comment", &Query::new(), &scope_str, &Facet::Complete);
    /// assert_eq!(a, b);
    ///
    /// // Facet identity keeps partial and complete views apart.
    /// let partial = QueryFingerprint::compute(
    ///     "comment",
    ///     &Query::new(),
    ///     &scope,
    ///     &Facet::Named("recent".into()),
    /// );
    /// assert_ne!(a, partial);
    /// ```
    pub fn compute(kind: &str, query: &Query, locations: &[LocationRef], facet: &Facet) -> Self {
        let input = format!(
            "query:{kind}:{facet}:{predicate}@{scope}",
            facet = facet.tag(),
            predicate = query.canonical(),
            scope = normalize_scope(locations),
        );
        let digest = Sha256::digest(input.as_bytes());
        let mut hex = String::with_capacity(64);
        for byte in digest {
            hex.push_str(&format!("{byte:02x}"));
        }
        QueryFingerprint(hex)
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Writes a JSON value in canonical form: object keys sorted recursively,
/// no insignificant whitespace.
///
/// Specified once here; every fingerprint derives from this function rather
/// than from ad-hoc serialization at call sites.
pub fn canonical_json(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, k) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::to_string(k).expect("string serializes"));
                out.push(':');
                canonical_json(&map[*k], out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                canonical_json(item, out);
            }
            out.push(']');
        },
        other => {
            out.push_str(&serde_json::to_string(other).expect("scalar serializes"));
        },
    }
}
