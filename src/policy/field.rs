//! Per-field policy: allow-list, specification table, aliases.

use std::collections::BTreeSet;

use crate::canonical::fingerprint;
use crate::renderer::RendererRef;
use crate::types::{EntityType, FieldPath, Multiplicity};

use super::declaration::PolicyDeclaration;

/// A requested path conflicts with the deployed policy.
///
/// Both variants indicate a mismatch between configuration and the path
/// vocabulary clients actually use; they are never downgraded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// Path outside the field's allow-list.
    #[error(
        "The path '{path}' is not listed as an allowed path on {entity_type}'s '{field}' field. \
         Add it to the field's allow-list to permit its expansion. Allowed: [{}]",
        .allowed.join(", ")
    )]
    NotAllowed {
        /// Offending path, relative to the owning type.
        path: String,
        /// Owning type.
        entity_type: EntityType,
        /// Relation field.
        field: String,
        /// Allowed paths, relative to the owning type.
        allowed: Vec<String>,
    },
    /// Path absent from every specification entry.
    #[error(
        "The path '{path}' is not specified on {entity_type}'s '{field}' field.\n\nCurrently specified:\n{listing}"
    )]
    NotSpecified {
        /// Offending canonical path.
        path: String,
        /// Owning type.
        entity_type: EntityType,
        /// Relation field.
        field: String,
        /// Every configured path across all entries, in declaration order.
        specified: Vec<String>,
        /// Human-readable table grouped by renderer.
        listing: String,
    },
}

/// Error building a policy from its declaration.
#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    /// A declared path has no segments.
    #[error("Empty path declared on {entity_type}'s '{field}' field: {raw:?}")]
    EmptyPath {
        /// Owning type.
        entity_type: EntityType,
        /// Relation field.
        field: String,
        /// Raw declared value.
        raw: String,
    },
    /// A declared path does not start at the field.
    #[error("Path '{path}' declared on {entity_type}'s '{field}' field does not start at the field")]
    ForeignPath {
        /// Owning type.
        entity_type: EntityType,
        /// Relation field.
        field: String,
        /// Canonical path.
        path: String,
    },
    /// The policy table JSON could not be parsed.
    #[error("Invalid policy declaration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Canonical alias remap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRemap {
    /// Relation actually followed.
    pub base_name: String,
    /// Path whose entry renders the target.
    pub alias_path: FieldPath,
}

/// Canonical specification entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    /// Rooted paths this entry renders.
    pub paths: Vec<FieldPath>,
    /// Symbolic renderer reference.
    pub renderer: RendererRef,
    /// Single object or collection.
    pub multiplicity: Multiplicity,
    /// Fields the renderer must leave out.
    pub omitted_fields: BTreeSet<String>,
    /// Optional alias remap.
    pub alias: Option<AliasRemap>,
    /// Drop empty representations from collections.
    pub drop_empty: bool,
}

/// Immutable expansion policy of one relation field.
#[derive(Debug, Clone)]
pub struct FieldPolicy {
    entity_type: EntityType,
    field: String,
    own_path: FieldPath,
    allowed: BTreeSet<FieldPath>,
    ignored: BTreeSet<FieldPath>,
    entries: Vec<PolicyEntry>,
    fingerprint: String,
}

impl FieldPolicy {
    /// Canonicalize a declaration for `entity_type.field`.
    pub fn new(
        entity_type: EntityType,
        field: impl Into<String>,
        declaration: &PolicyDeclaration,
    ) -> Result<Self, DeclarationError> {
        let field = field.into();
        let own_path = FieldPath::from_segments([entity_type.as_str(), field.as_str()]).ok_or_else(|| {
            DeclarationError::EmptyPath {
                entity_type: entity_type.clone(),
                field: field.clone(),
                raw: field.clone(),
            }
        })?;

        let canon = |raw: &str| -> Result<FieldPath, DeclarationError> {
            let path = FieldPath::parse(raw)
                .ok_or_else(|| DeclarationError::EmptyPath {
                    entity_type: entity_type.clone(),
                    field: field.clone(),
                    raw: raw.to_string(),
                })?
                .rooted_at(&entity_type);
            if !path.starts_with(&own_path) {
                return Err(DeclarationError::ForeignPath {
                    entity_type: entity_type.clone(),
                    field: field.clone(),
                    path: path.to_string(),
                });
            }
            Ok(path)
        };

        let mut allowed = BTreeSet::from([own_path.clone()]);
        for raw in &declaration.allowed {
            allowed.insert(canon(raw)?);
        }

        let mut ignored = BTreeSet::new();
        for raw in &declaration.ignored {
            ignored.insert(canon(raw)?);
        }

        let mut entries = Vec::with_capacity(declaration.specification.len());
        for entry in &declaration.specification {
            let paths = entry.paths.iter().map(|raw| canon(raw)).collect::<Result<Vec<_>, _>>()?;
            let alias = match &entry.alias {
                Some(alias) => Some(AliasRemap {
                    base_name: alias.base_name.clone(),
                    alias_path: canon(&alias.alias_path)?,
                }),
                None => None,
            };
            entries.push(PolicyEntry {
                paths,
                renderer: entry.renderer.clone(),
                multiplicity: entry.multiplicity,
                omitted_fields: entry.omitted_fields.iter().cloned().collect(),
                alias,
                drop_empty: entry.drop_empty,
            });
        }

        let fingerprint = fingerprint(declaration)?;

        Ok(Self {
            entity_type,
            field,
            own_path,
            allowed,
            ignored,
            entries,
            fingerprint,
        })
    }

    /// Owning entity type.
    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    /// Relation field name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// The field's own rooted path (`order.customer`).
    pub fn own_path(&self) -> &FieldPath {
        &self.own_path
    }

    /// Canonical hash of the declaration this policy was built from.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Ordered specification entries.
    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    /// Whether a requested path targets this field.
    pub fn is_matching(&self, path: &FieldPath) -> bool {
        path.starts_with(&self.own_path)
    }

    /// Whether `path` may be expanded from this field.
    pub fn is_allowed(&self, path: &FieldPath) -> bool {
        self.allowed.contains(path)
    }

    /// Whether some specification entry lists `path`.
    pub fn is_specified(&self, path: &FieldPath) -> bool {
        self.entry_for(path).is_some()
    }

    /// First specification entry listing `path`.
    pub fn entry_for(&self, path: &FieldPath) -> Option<&PolicyEntry> {
        self.entries.iter().find(|entry| entry.paths.contains(path))
    }

    /// Alias remap configured for `path`, if any.
    pub fn alias_for(&self, path: &FieldPath) -> Option<&AliasRemap> {
        self.entry_for(path).and_then(|entry| entry.alias.as_ref())
    }

    /// Fail unless `path` is allowed.
    pub fn assert_allowed(&self, path: &FieldPath) -> Result<(), PolicyViolation> {
        if self.is_allowed(path) {
            return Ok(());
        }
        Err(PolicyViolation::NotAllowed {
            path: relative(path),
            entity_type: self.entity_type.clone(),
            field: self.field.clone(),
            allowed: self.allowed_listing(),
        })
    }

    /// Fail unless `path` is specified.
    pub fn assert_specified(&self, path: &FieldPath) -> Result<(), PolicyViolation> {
        if self.is_specified(path) {
            return Ok(());
        }
        Err(PolicyViolation::NotSpecified {
            path: path.to_string(),
            entity_type: self.entity_type.clone(),
            field: self.field.clone(),
            specified: self.specified_listing(),
            listing: self.specification_table(),
        })
    }

    /// Check every prefix of `path` from the field down, allow-list first.
    pub fn validate(&self, path: &FieldPath) -> Result<(), PolicyViolation> {
        for prefix in path.prefixes_from(self.own_path.len()) {
            self.assert_allowed(&prefix)?;
            self.assert_specified(&prefix)?;
        }
        Ok(())
    }

    /// Allowed paths relative to the owning type, sorted.
    pub fn allowed_listing(&self) -> Vec<String> {
        self.allowed.iter().map(relative).collect()
    }

    /// Every configured path across all entries, in declaration order.
    pub fn specified_listing(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|entry| entry.paths.iter().map(ToString::to_string))
            .collect()
    }

    /// Fields to omit when rendering the level at `level_path` with `entry`.
    ///
    /// Union of the entry's omitted fields, ignored paths ending one level
    /// below `level_path`, and back-references to the owning type.
    pub fn omitted_for(&self, level_path: &FieldPath, entry: &PolicyEntry) -> BTreeSet<String> {
        let mut omitted = entry.omitted_fields.clone();
        for ignored in &self.ignored {
            if ignored.len() == level_path.len() + 1 && ignored.starts_with(level_path) {
                omitted.insert(ignored.last().to_string());
            }
        }
        omitted.insert(self.entity_type.as_str().to_string());
        omitted.insert(self.entity_type.reverse_name());
        omitted
    }

    fn specification_table(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                let paths: Vec<String> = entry.paths.iter().map(|p| format!("    {p}")).collect();
                format!("{}\n{}", entry.renderer, paths.join("\n"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn relative(path: &FieldPath) -> String {
    path.without_root().map(|p| p.to_string()).unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::declaration::SpecificationEntry;

    fn path(s: &str) -> FieldPath {
        s.parse().unwrap()
    }

    fn customer_policy() -> FieldPolicy {
        let decl = PolicyDeclaration::new()
            .allow(["customer.profile", "order.customer.orders"])
            .ignore(["customer.password"])
            .entry(SpecificationEntry::new(["customer"], "customer"))
            .entry(SpecificationEntry::new(["customer.profile", "customer.address"], "profile").omitting(["secret"]));
        FieldPolicy::new(EntityType::new("order"), "customer", &decl).unwrap()
    }

    #[test]
    fn test_own_path_always_allowed() {
        let policy = customer_policy();
        assert!(policy.is_allowed(&path("order.customer")));
        assert!(policy.is_allowed(&path("order.customer.profile")));
        assert!(policy.is_allowed(&path("order.customer.orders")));
        assert!(!policy.is_allowed(&path("order.customer.address")));
    }

    #[test]
    fn test_empty_allow_list_still_allows_own_path() {
        let decl = PolicyDeclaration::new().entry(SpecificationEntry::new(["customer"], "customer"));
        let policy = FieldPolicy::new(EntityType::new("order"), "customer", &decl).unwrap();
        assert!(policy.is_allowed(&path("order.customer")));
        assert!(!policy.is_allowed(&path("order.customer.profile")));
        assert_eq!(policy.allowed_listing(), vec!["customer".to_string()]);
    }

    #[test]
    fn test_specified_but_not_allowed_reports_allow_list() {
        let policy = customer_policy();
        let err = policy.validate(&path("order.customer.address")).unwrap_err();
        match err {
            PolicyViolation::NotAllowed { path, allowed, .. } => {
                assert_eq!(path, "customer.address");
                assert_eq!(allowed, vec!["customer", "customer.orders", "customer.profile"]);
            }
            other => panic!("expected NotAllowed, got {other:?}"),
        }
    }

    #[test]
    fn test_allowed_but_not_specified_lists_table() {
        let policy = customer_policy();
        let err = policy.validate(&path("order.customer.orders")).unwrap_err();
        match &err {
            PolicyViolation::NotSpecified { specified, .. } => {
                assert_eq!(
                    specified,
                    &vec!["order.customer", "order.customer.profile", "order.customer.address"]
                );
            }
            other => panic!("expected NotSpecified, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("profile\n    order.customer.profile\n    order.customer.address"));
    }

    #[test]
    fn test_validate_checks_every_prefix() {
        let decl = PolicyDeclaration::new()
            .allow(["customer.profile"])
            .entry(SpecificationEntry::new(["customer.profile"], "profile"));
        let policy = FieldPolicy::new(EntityType::new("order"), "customer", &decl).unwrap();

        // the field itself has no entry, so the deeper path cannot be rendered
        let err = policy.validate(&path("order.customer.profile")).unwrap_err();
        assert!(matches!(err, PolicyViolation::NotSpecified { ref path, .. } if path == "order.customer"));
    }

    #[test]
    fn test_omitted_for_level() {
        let policy = customer_policy();
        let level = path("order.customer");
        let entry = policy.entry_for(&level).unwrap().clone();
        let omitted = policy.omitted_for(&level, &entry);
        assert!(omitted.contains("password"));
        assert!(omitted.contains("order"));
        assert!(omitted.contains("order_set"));

        let deeper = path("order.customer.profile");
        let entry = policy.entry_for(&deeper).unwrap().clone();
        let omitted = policy.omitted_for(&deeper, &entry);
        assert!(omitted.contains("secret"));
        assert!(!omitted.contains("password"));
    }

    #[test]
    fn test_foreign_path_rejected() {
        let decl = PolicyDeclaration::new().allow(["items.product"]);
        let err = FieldPolicy::new(EntityType::new("order"), "customer", &decl).unwrap_err();
        assert!(matches!(err, DeclarationError::ForeignPath { .. }));
    }

    #[test]
    fn test_fingerprint_tracks_declaration() {
        let a = customer_policy();
        let b = customer_policy();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let other = FieldPolicy::new(EntityType::new("order"), "customer", &PolicyDeclaration::new()).unwrap();
        assert_ne!(a.fingerprint(), other.fingerprint());
    }
}
