//! Entity types and relation descriptors for the relation graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix used by conventional reverse-collection names (`item_set`).
pub const REVERSE_SUFFIX: &str = "_set";

/// A named node type in the relation graph (e.g. `order`, `customer`).
///
/// Implements `Ord` so type-keyed maps iterate deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    /// Create an entity type from its canonical name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Canonical name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conventional reverse-collection name pointing at this type (`order_set`).
    pub fn reverse_name(&self) -> String {
        format!("{}{}", self.0, REVERSE_SUFFIX)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Whether a relation yields a single related object or a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Multiplicity {
    /// A single related object (or none).
    #[default]
    One,
    /// A re-iterable collection of related objects.
    Many,
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "one"),
            Self::Many => write!(f, "many"),
        }
    }
}

/// A declared relation field on an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationField {
    /// Field name on the owning type.
    pub name: String,
    /// Type of the related object(s).
    pub target: EntityType,
    /// Single object or collection.
    #[serde(default)]
    pub multiplicity: Multiplicity,
    /// Whether this is the reverse side of a relation declared on `target`.
    #[serde(default)]
    pub is_reverse: bool,
    /// Forward field on `target` that this reverse relation mirrors.
    ///
    /// When unset, the forward field is named after the owning type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
}

impl RelationField {
    /// Forward relation.
    pub fn new(name: impl Into<String>, target: impl Into<EntityType>, multiplicity: Multiplicity) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            multiplicity,
            is_reverse: false,
            via: None,
        }
    }

    /// Reverse (children pointing back) relation; always a collection.
    pub fn reverse(name: impl Into<String>, target: impl Into<EntityType>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            multiplicity: Multiplicity::Many,
            is_reverse: true,
            via: None,
        }
    }

    /// Name the forward field on `target` this reverse relation mirrors.
    pub fn via(mut self, forward_field: impl Into<String>) -> Self {
        self.via = Some(forward_field.into());
        self
    }

    /// Forward field on `target` pointing back at an `owner` instance.
    ///
    /// `None` for forward relations.
    pub fn forward_field<'a>(&'a self, owner: &'a EntityType) -> Option<&'a str> {
        if !self.is_reverse {
            return None;
        }
        Some(self.via.as_deref().unwrap_or(owner.as_str()))
    }

    /// Whether a path segment names this relation.
    ///
    /// Reverse relations also answer to `<target>_set`.
    pub fn answers_to(&self, segment: &str) -> bool {
        if self.name == segment {
            return true;
        }
        self.is_reverse && segment == self.target.reverse_name()
    }
}
