//! Static policy table: entity type -> expandable field -> policy.
//!
//! Built once at construction and shared read-only. Field order within a
//! type follows declaration order.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::canonical::canonical_hash_hex;
use crate::types::EntityType;

use super::declaration::{PolicyDeclaration, TableDeclaration};
use super::field::{DeclarationError, FieldPolicy};

/// Registry of immutable field policies with a stable fingerprint.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    types: BTreeMap<EntityType, Vec<FieldPolicy>>,
    fingerprint: String,
}

impl PolicyTable {
    /// Create an empty table.
    pub fn new() -> Self {
        let mut table = Self {
            types: BTreeMap::new(),
            fingerprint: String::new(),
        };
        table.update_fingerprint();
        table
    }

    /// Build a table from declarations.
    pub fn from_declarations(declarations: &TableDeclaration) -> Result<Self, DeclarationError> {
        let mut table = Self::new();
        for (entity_type, fields) in declarations {
            for decl in fields {
                table.declare(entity_type.clone(), decl.field.clone(), &decl.policy)?;
            }
        }
        tracing::info!(
            types = table.types.len(),
            fields = table.len(),
            fingerprint = %table.fingerprint,
            "policy table built"
        );
        Ok(table)
    }

    /// Parse the JSON declaration format and build a table.
    pub fn from_json(json: &str) -> Result<Self, DeclarationError> {
        let declarations: TableDeclaration = serde_json::from_str(json)?;
        Self::from_declarations(&declarations)
    }

    /// Declare (or replace) the policy of `entity_type.field`.
    pub fn declare(
        &mut self,
        entity_type: impl Into<EntityType>,
        field: impl Into<String>,
        declaration: &PolicyDeclaration,
    ) -> Result<&mut Self, DeclarationError> {
        let policy = FieldPolicy::new(entity_type.into(), field, declaration)?;
        let fields = self.types.entry(policy.entity_type().clone()).or_default();
        match fields.iter_mut().find(|p| p.field() == policy.field()) {
            Some(existing) => *existing = policy,
            None => fields.push(policy),
        }
        self.update_fingerprint();
        Ok(self)
    }

    /// Expandable fields of `entity_type`, in declaration order.
    pub fn fields_of(&self, entity_type: &EntityType) -> &[FieldPolicy] {
        self.types.get(entity_type).map(Vec::as_slice).unwrap_or_default()
    }

    /// Policy of one field.
    pub fn get(&self, entity_type: &EntityType, field: &str) -> Option<&FieldPolicy> {
        self.fields_of(entity_type).iter().find(|p| p.field() == field)
    }

    /// Total number of field policies.
    pub fn len(&self) -> usize {
        self.types.values().map(Vec::len).sum()
    }

    /// Whether no policy is declared.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprint over every field policy; changes when any policy changes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn update_fingerprint(&mut self) {
        let parts: Vec<Value> = self
            .types
            .values()
            .flatten()
            .map(|p| {
                Value::Array(vec![
                    Value::String(p.entity_type().to_string()),
                    Value::String(p.field().to_string()),
                    Value::String(p.fingerprint().to_string()),
                ])
            })
            .collect();
        self.fingerprint = canonical_hash_hex(&Value::Array(parts));
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self::new()
    }
}
