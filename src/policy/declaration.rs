//! Declarative policy format.
//!
//! ```json
//! {
//!   "order": [
//!     {
//!       "field": "customer",
//!       "allowed": ["customer.profile"],
//!       "ignored": ["customer.password"],
//!       "specification": [
//!         {"paths": ["customer"], "renderer": "customer"},
//!         {"paths": ["customer.profile"], "renderer": "profile", "omitted_fields": ["customer"]}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Paths may be written relative to the owning type (`customer.profile`) or
//! rooted (`order.customer.profile`); both canonicalize to the rooted form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::renderer::RendererRef;
use crate::types::{EntityType, Multiplicity};

/// Alias remap: follow `base_name` and render with the entry for `alias_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasDeclaration {
    /// Relation actually followed on the live instance.
    pub base_name: String,
    /// Path whose specification entry renders the target.
    pub alias_path: String,
}

/// One row of the specification table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationEntry {
    /// Paths this entry renders.
    pub paths: Vec<String>,
    /// Symbolic renderer reference.
    pub renderer: RendererRef,
    /// Single object or collection.
    #[serde(default)]
    pub multiplicity: Multiplicity,
    /// Fields the renderer must leave out.
    #[serde(default)]
    pub omitted_fields: Vec<String>,
    /// Optional alias remap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<AliasDeclaration>,
    /// Drop empty representations from rendered collections.
    #[serde(default)]
    pub drop_empty: bool,
}

impl SpecificationEntry {
    /// Entry rendering `paths` with `renderer`, multiplicity one.
    pub fn new<I, S>(paths: I, renderer: impl Into<RendererRef>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            renderer: renderer.into(),
            multiplicity: Multiplicity::One,
            omitted_fields: Vec::new(),
            alias: None,
            drop_empty: false,
        }
    }

    /// Render collections.
    pub fn many(mut self) -> Self {
        self.multiplicity = Multiplicity::Many;
        self
    }

    /// Leave `fields` out of the rendered representation.
    pub fn omitting<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.omitted_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Follow `base_name` and render with the entry for `alias_path`.
    pub fn aliased(mut self, base_name: impl Into<String>, alias_path: impl Into<String>) -> Self {
        self.alias = Some(AliasDeclaration {
            base_name: base_name.into(),
            alias_path: alias_path.into(),
        });
        self
    }

    /// Drop empty representations from rendered collections.
    pub fn dropping_empty(mut self) -> Self {
        self.drop_empty = true;
        self
    }
}

/// Policy of one relation field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDeclaration {
    /// Paths permitted beyond the field's own name.
    #[serde(default)]
    pub allowed: Vec<String>,
    /// Paths whose last segment is omitted at their level.
    #[serde(default)]
    pub ignored: Vec<String>,
    /// Ordered specification table.
    #[serde(default)]
    pub specification: Vec<SpecificationEntry>,
}

impl PolicyDeclaration {
    /// Empty declaration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Permit more paths.
    pub fn allow<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Ignore more paths.
    pub fn ignore<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Append a specification entry.
    pub fn entry(mut self, entry: SpecificationEntry) -> Self {
        self.specification.push(entry);
        self
    }
}

/// A field name paired with its policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Relation field name on the owning type.
    pub field: String,
    /// Policy body.
    #[serde(flatten)]
    pub policy: PolicyDeclaration,
}

/// Policies for every expandable field, per owning type, in declaration order.
pub type TableDeclaration = BTreeMap<EntityType, Vec<FieldDeclaration>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults() {
        let entry: SpecificationEntry =
            serde_json::from_str(r#"{"paths": ["items"], "renderer": "item"}"#).unwrap();
        assert_eq!(entry.multiplicity, Multiplicity::One);
        assert!(entry.omitted_fields.is_empty());
        assert!(entry.alias.is_none());
        assert!(!entry.drop_empty);
    }

    #[test]
    fn test_field_declaration_is_flat() {
        let decl: FieldDeclaration = serde_json::from_str(
            r#"{
                "field": "customer",
                "allowed": ["customer.profile"],
                "specification": [
                    {"paths": ["customer"], "renderer": "customer"},
                    {"paths": ["customer.profile"], "renderer": "profile", "multiplicity": "one",
                     "alias": {"base_name": "profile", "alias_path": "customer.profile"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(decl.field, "customer");
        assert_eq!(decl.policy.allowed, vec!["customer.profile"]);
        assert_eq!(decl.policy.specification.len(), 2);
        assert_eq!(
            decl.policy.specification[1].alias.as_ref().map(|a| a.base_name.as_str()),
            Some("profile")
        );
    }

    #[test]
    fn test_builder_matches_json() {
        let built = PolicyDeclaration::new()
            .allow(["items.product"])
            .entry(SpecificationEntry::new(["items"], "item").many());
        let parsed: PolicyDeclaration = serde_json::from_str(
            r#"{"allowed": ["items.product"],
                "specification": [{"paths": ["items"], "renderer": "item", "multiplicity": "many"}]}"#,
        )
        .unwrap();
        assert_eq!(built, parsed);
    }
}
