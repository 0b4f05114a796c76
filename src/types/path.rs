//! Dotted relation paths.
//!
//! A `FieldPath` is an ordered, non-empty sequence of field-name segments.
//! Canonical paths are rooted: segment 0 names the entity type the path
//! starts from, segment 1 names the top-level relation field.
//!
//! ```text
//! order.customer.profile
//!   │      │        └─ walked from customer
//!   │      └─ top-level relation field on order
//!   └─ rooting entity type
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::entity::EntityType;

/// An ordered, non-empty sequence of field-name segments.
///
/// Ordering is segment-wise lexicographic, which keeps sets of paths
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

/// Error parsing a path with no usable segments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Empty field path: {0:?}")]
pub struct EmptyPathError(pub String);

impl FieldPath {
    /// Build a path from segments, skipping empty ones.
    ///
    /// Returns `None` when no segment survives.
    pub fn from_segments<I, S>(segments: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments
            .into_iter()
            .map(Into::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self { segments })
        }
    }

    /// Parse a dotted path, dropping empty segments (`a..b` is `a.b`).
    pub fn parse(raw: &str) -> Option<Self> {
        Self::from_segments(raw.split('.'))
    }

    /// All segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments (never zero).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// First segment.
    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    /// Last segment.
    pub fn last(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Segment at `index`, if any.
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Whether this path is rooted at `root`.
    pub fn is_rooted_at(&self, root: &EntityType) -> bool {
        self.first() == root.as_str()
    }

    /// Return the path prefixed with `root` unless it already starts with it.
    pub fn rooted_at(&self, root: &EntityType) -> Self {
        if self.is_rooted_at(root) {
            return self.clone();
        }
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(root.as_str().to_string());
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }

    /// Drop the first segment (the root), if anything remains.
    pub fn without_root(&self) -> Option<Self> {
        Self::from_segments(self.segments.iter().skip(1).cloned())
    }

    /// The first `len` segments.
    ///
    /// `len` is clamped to `1..=self.len()`.
    pub fn prefix(&self, len: usize) -> Self {
        let len = len.clamp(1, self.segments.len());
        Self {
            segments: self.segments[..len].to_vec(),
        }
    }

    /// Segment-wise prefix test (`a.b` is a prefix of `a.b.c`, not of `a.bc`).
    pub fn starts_with(&self, other: &FieldPath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }

    /// Whether `self` is a strict prefix of `other`.
    pub fn is_strict_prefix_of(&self, other: &FieldPath) -> bool {
        other.segments.len() > self.segments.len() && other.starts_with(self)
    }

    /// Every prefix from `min_len` segments up to the full path.
    pub fn prefixes_from(&self, min_len: usize) -> impl Iterator<Item = FieldPath> + '_ {
        (min_len.max(1)..=self.segments.len()).map(move |len| self.prefix(len))
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for FieldPath {
    type Err = EmptyPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| EmptyPathError(s.to_string()))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
