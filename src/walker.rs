//! Graph walker: split a canonical path at one depth.
//!
//! ```text
//! order.customer.profile.avatar      depth = 2, owner type = customer
//!       ^^^^^^^^ ^^^^^^^ ^^^^^^
//!       resolved  prefix  suffix
//! ```
//!
//! Segments resolve against the declared relation schema, never by probing
//! live attributes. Reverse relations answer to `<target>_set` as well as
//! their declared name. Alias remaps configured in the field policy replace
//! the relation followed and the specification lookup path; the key written
//! into the output stays the segment the client asked for.

use std::sync::Arc;

use crate::policy::FieldPolicy;
use crate::store::TypeGraph;
use crate::types::{EntityType, FieldPath, RelationField};

/// A path split at one depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParts {
    /// Relation actually followed on the owner (after alias substitution).
    pub prefix_field: String,
    /// Path whose specification entry renders this level.
    pub prefix_path: FieldPath,
    /// Next relation to follow on the target, if the path continues.
    pub suffix_field: Option<String>,
    /// Unresolved remainder after this level, if the path continues.
    pub suffix_path: Option<FieldPath>,
    /// Output key (the client's segment).
    pub key: String,
    /// Declared relation behind `prefix_field`.
    pub relation: RelationField,
}

/// Outcome of splitting a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Walk {
    /// The segment resolved to a declared relation.
    Resolved(PathParts),
    /// No relation answers to the segment.
    Missing {
        /// Segment that failed to resolve.
        segment: String,
        /// Path up to and including that segment.
        at: FieldPath,
    },
}

/// Splits canonical paths using the declared relation schema.
pub struct GraphWalker<T: TypeGraph> {
    graph: Arc<T>,
}

impl<T: TypeGraph> GraphWalker<T> {
    /// Create a walker over `graph`.
    pub fn new(graph: Arc<T>) -> Self {
        Self { graph }
    }

    /// Split `path` at `depth`, where `owner_type` is the type reached by
    /// `path[..depth]` (depth 1 is the top-level field of the root).
    pub fn split(&self, owner_type: &EntityType, path: &FieldPath, depth: usize, policy: &FieldPolicy) -> Walk {
        let level = path.prefix(depth + 1);
        let Some(segment) = path.segment(depth) else {
            return Walk::Missing {
                segment: path.last().to_string(),
                at: level,
            };
        };

        let (followed, prefix_path) = match policy.alias_for(&level) {
            Some(alias) => (alias.base_name.clone(), alias.alias_path.clone()),
            None => (segment.to_string(), level.clone()),
        };

        let Some(relation) = self.graph.relation_named(owner_type, &followed) else {
            tracing::debug!(owner = %owner_type, segment = %followed, path = %path, "segment does not resolve");
            return Walk::Missing { segment: followed, at: level };
        };

        let (suffix_field, suffix_path) = self.suffix(&relation.target, path, depth, policy);

        Walk::Resolved(PathParts {
            prefix_field: relation.name.clone(),
            prefix_path,
            suffix_field,
            suffix_path,
            key: segment.to_string(),
            relation,
        })
    }

    fn suffix(
        &self,
        target: &EntityType,
        path: &FieldPath,
        depth: usize,
        policy: &FieldPolicy,
    ) -> (Option<String>, Option<FieldPath>) {
        let Some(next) = path.segment(depth + 1) else {
            return (None, None);
        };

        let next_field = policy
            .alias_for(&path.prefix(depth + 2))
            .map(|alias| alias.base_name.clone())
            .unwrap_or_else(|| next.to_string());

        if self.graph.relation_named(target, &next_field).is_none() {
            // Truncate to the prefix; the level still renders.
            tracing::debug!(target = %target, segment = %next_field, path = %path, "suffix does not resolve");
            return (None, None);
        }

        let remainder = FieldPath::from_segments(path.segments()[depth + 1..].iter().cloned());
        (Some(next_field), remainder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDeclaration, SpecificationEntry};
    use crate::store::{InMemoryGraph, RelationSchema};
    use crate::types::Multiplicity;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn walker() -> GraphWalker<InMemoryGraph> {
        let mut schema = RelationSchema::new();
        schema
            .declare("order", RelationField::new("customer", "customer", Multiplicity::One))
            .declare("customer", RelationField::new("profile", "profile", Multiplicity::One))
            .declare("customer", RelationField::new("account_manager", "staff", Multiplicity::One))
            .declare("customer", RelationField::reverse("orders", "order"))
            .declare("staff", RelationField::new("office", "office", Multiplicity::One));
        GraphWalker::new(Arc::new(InMemoryGraph::new(schema)))
    }

    fn policy() -> FieldPolicy {
        let decl = PolicyDeclaration::new()
            .allow(["customer.profile", "customer.manager", "customer.manager.office"])
            .entry(SpecificationEntry::new(["customer"], "customer"))
            .entry(SpecificationEntry::new(["customer.profile"], "profile"))
            .entry(SpecificationEntry::new(["customer.manager"], "staff").aliased("account_manager", "customer.manager"))
            .entry(SpecificationEntry::new(["customer.manager.office"], "office"));
        FieldPolicy::new(EntityType::new("order"), "customer", &decl).unwrap()
    }

    #[test]
    fn test_split_top_level_with_suffix() {
        let walk = walker().split(&EntityType::new("order"), &path("order.customer.profile"), 1, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.key, "customer");
        assert_eq!(parts.prefix_field, "customer");
        assert_eq!(parts.prefix_path, path("order.customer"));
        assert_eq!(parts.suffix_field.as_deref(), Some("profile"));
        assert_eq!(parts.suffix_path, Some(path("profile")));
        assert_eq!(parts.relation.target, EntityType::new("customer"));
    }

    #[test]
    fn test_split_leaf_has_no_suffix() {
        let walk = walker().split(&EntityType::new("customer"), &path("order.customer.profile"), 2, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.key, "profile");
        assert_eq!(parts.suffix_field, None);
        assert_eq!(parts.suffix_path, None);
    }

    #[test]
    fn test_reverse_set_name_resolves() {
        let walk = walker().split(&EntityType::new("customer"), &path("order.customer.order_set"), 2, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.key, "order_set");
        assert_eq!(parts.prefix_field, "orders");
        assert!(parts.relation.is_reverse);
    }

    #[test]
    fn test_alias_substitutes_relation_and_lookup_path() {
        let walk = walker().split(&EntityType::new("customer"), &path("order.customer.manager.office"), 2, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.key, "manager");
        assert_eq!(parts.prefix_field, "account_manager");
        assert_eq!(parts.prefix_path, path("order.customer.manager"));
        assert_eq!(parts.suffix_field.as_deref(), Some("office"));
    }

    #[test]
    fn test_alias_applies_to_suffix() {
        let walk = walker().split(&EntityType::new("order"), &path("order.customer.manager"), 1, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.suffix_field.as_deref(), Some("account_manager"));
        assert_eq!(parts.suffix_path, Some(path("manager")));
    }

    #[test]
    fn test_missing_segment() {
        let walk = walker().split(&EntityType::new("customer"), &path("order.customer.wishlist"), 2, &policy());
        assert_eq!(
            walk,
            Walk::Missing {
                segment: "wishlist".to_string(),
                at: path("order.customer.wishlist"),
            }
        );
    }

    #[test]
    fn test_unresolved_suffix_truncates() {
        let walk = walker().split(&EntityType::new("order"), &path("order.customer.wishlist"), 1, &policy());
        let Walk::Resolved(parts) = walk else {
            panic!("expected resolved walk, got {walk:?}");
        };
        assert_eq!(parts.key, "customer");
        assert_eq!(parts.suffix_field, None);
        assert_eq!(parts.suffix_path, None);
    }
}
