//! Expansion builder: the recursive core.
//!
//! ## Algorithm
//!
//! For one top-level field and its requested paths:
//!
//! 1. Validate every path against the field policy (allow-list, then
//!    specification) before walking anything
//! 2. For each path, in normalized order, with a fresh resolution chain:
//!    - Split the path at the current depth
//!    - Fall back if the segment is missing, the target type is already on
//!      the chain, or the relation is absent
//!    - Resolve the specification entry and its renderer, render the target
//!      object or each element of the target collection
//!    - Recurse into the suffix for every rendered object, nesting the result
//!      under the suffix key
//! 3. Merge: the first expanded path is the base; every later result is merged
//!    into it along the path's own segments
//!
//! Fallbacks are soft. The branch keeps whatever the enclosing renderer
//! produced; sibling paths continue normally.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::ExpansionConfig;
use crate::cycle::{CycleGuard, ResolutionChain};
use crate::policy::{FieldPolicy, PolicyViolation};
use crate::renderer::{BoundRenderer, ConfigurationError, RenderError, RendererResolver, RequestContext};
use crate::store::{Related, RelationAccessor, TypeGraph};
use crate::types::{EntityType, Expanded, FieldPath, Multiplicity, Representation};
use crate::walker::{GraphWalker, PathParts, Walk};

/// Error type for expansion.
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    /// Requested path conflicts with the field policy.
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    /// Missing renderer or specification.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// A renderer failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// Relation accessor error.
    #[error("Store error: {0}")]
    StoreError(String),
    /// Requested path exceeds the configured depth limit.
    #[error("Path '{path}' is {depth} levels deep; at most {max_depth} are allowed")]
    PathTooDeep {
        /// Offending canonical path.
        path: FieldPath,
        /// Segments after the root.
        depth: usize,
        /// Configured limit.
        max_depth: usize,
    },
}

impl ExpandError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }
}

/// Why a branch kept its default representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    /// A path segment names no declared relation.
    Gap {
        /// Segment that failed to resolve.
        segment: String,
        /// Path up to and including that segment.
        at: FieldPath,
    },
    /// The relation's target type is already an ancestor.
    Circular {
        /// Type that would have been revisited.
        entity_type: EntityType,
    },
    /// The relation holds nothing.
    Absent {
        /// Output key of the empty relation.
        key: String,
    },
}

/// Outcome of resolving one path from one owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    /// The path expanded.
    Expanded(Expanded),
    /// The path kept its default representation.
    Fallback(Fallback),
}

#[derive(Clone, Copy)]
struct Step<'a> {
    policy: &'a FieldPolicy,
    path: &'a FieldPath,
    request: &'a RequestContext,
}

/// Expands the requested paths of one field into a nested representation.
pub struct ExpansionBuilder<A: RelationAccessor, T: TypeGraph> {
    accessor: Arc<A>,
    walker: GraphWalker<T>,
    guard: CycleGuard<T>,
    resolver: Arc<RendererResolver<A::Instance>>,
    identity_field: String,
}

impl<A: RelationAccessor, T: TypeGraph> ExpansionBuilder<A, T> {
    /// Create a builder from its collaborators.
    pub fn new(
        accessor: Arc<A>,
        graph: Arc<T>,
        resolver: Arc<RendererResolver<A::Instance>>,
        config: &ExpansionConfig,
    ) -> Self {
        Self {
            accessor,
            walker: GraphWalker::new(Arc::clone(&graph)),
            guard: CycleGuard::new(graph),
            resolver,
            identity_field: config.identity_field.clone(),
        }
    }

    /// Expand `paths` (all matching `policy`'s field) from `parent`.
    ///
    /// Returns `None` when every path fell back, in which case the parent's
    /// default value for the field stands.
    pub fn expand(
        &self,
        parent: &A::Instance,
        policy: &FieldPolicy,
        paths: &BTreeSet<FieldPath>,
        request: &RequestContext,
    ) -> Result<Option<Expanded>, ExpandError> {
        for path in paths {
            policy.validate(path)?;
        }

        let root = self.accessor.type_of(parent);
        let mut merged: Option<Expanded> = None;

        for path in paths {
            match self.expand_path(parent, &root, policy, path, request)? {
                Branch::Expanded(item) => match merged.as_mut() {
                    None => merged = Some(item),
                    Some(base) => {
                        let keys = path.segments().get(2..).unwrap_or_default();
                        merge_expanded(base, &item, keys, &self.identity_field);
                    }
                },
                Branch::Fallback(fallback) => {
                    tracing::debug!(path = %path, ?fallback, "path kept its default representation");
                }
            }
        }

        Ok(merged)
    }

    /// Resolve a single validated path from `parent`, whose type is `root`.
    pub fn expand_path(
        &self,
        parent: &A::Instance,
        root: &EntityType,
        policy: &FieldPolicy,
        path: &FieldPath,
        request: &RequestContext,
    ) -> Result<Branch, ExpandError> {
        let mut chain = ResolutionChain::seeded(root.clone());
        let step = Step { policy, path, request };
        self.resolve(parent, root, 1, &mut chain, step)
    }

    fn resolve(
        &self,
        owner: &A::Instance,
        owner_type: &EntityType,
        depth: usize,
        chain: &mut ResolutionChain,
        step: Step<'_>,
    ) -> Result<Branch, ExpandError> {
        let parts = match self.walker.split(owner_type, step.path, depth, step.policy) {
            Walk::Resolved(parts) => parts,
            Walk::Missing { segment, at } => return Ok(Branch::Fallback(Fallback::Gap { segment, at })),
        };

        if self.guard.would_cycle_via(owner_type, &parts.prefix_field, chain) {
            return Ok(Branch::Fallback(Fallback::Circular {
                entity_type: parts.relation.target,
            }));
        }

        let related = self
            .accessor
            .get_related(owner, &parts.prefix_field)
            .map_err(ExpandError::from_store)?;
        let (objects, many) = match related {
            Related::Absent => return Ok(Branch::Fallback(Fallback::Absent { key: parts.key })),
            Related::One(object) => (vec![object], false),
            Related::Many(objects) => (objects, true),
        };

        let entry = step
            .policy
            .entry_for(&parts.prefix_path)
            .ok_or_else(|| ConfigurationError::MissingSpecification {
                path: parts.prefix_path.clone(),
                field: step.policy.field().to_string(),
            })?;

        let declared_many = entry.multiplicity == Multiplicity::Many;
        if declared_many != many {
            tracing::warn!(
                path = %parts.prefix_path,
                declared = %entry.multiplicity,
                "declared multiplicity does not match the relation; rendering the data's shape"
            );
        }

        let renderer = self.resolver.resolve(&entry.renderer)?;
        let omitted = step.policy.omitted_for(&step.path.prefix(depth + 1), entry);
        let bound = self.resolver.construct(renderer, step.request, entry.multiplicity, omitted);

        let mut reps = if parts.suffix_field.is_none() {
            bound.render_many(&objects)?
        } else {
            chain.push(parts.relation.target.clone());
            let rendered = objects
                .iter()
                .map(|object| self.render_nested(&bound, object, &parts, depth, chain, step))
                .collect::<Result<Vec<_>, _>>();
            chain.pop();
            rendered?
        };

        if !many {
            return Ok(match reps.pop() {
                Some(rep) => Branch::Expanded(Expanded::One(rep)),
                None => Branch::Fallback(Fallback::Absent { key: parts.key }),
            });
        }

        if entry.drop_empty {
            reps.retain(|rep| !rep.is_empty());
        }
        Ok(Branch::Expanded(Expanded::Many(reps)))
    }

    /// Render `object` and expand the rest of the path beneath it.
    fn render_nested(
        &self,
        bound: &BoundRenderer<'_, A::Instance>,
        object: &A::Instance,
        parts: &PathParts,
        depth: usize,
        chain: &mut ResolutionChain,
        step: Step<'_>,
    ) -> Result<Representation, ExpandError> {
        let mut rep = bound.render_one(object)?;
        match self.resolve(object, &parts.relation.target, depth + 1, chain, step)? {
            Branch::Expanded(nested) => {
                if let Some(key) = step.path.segment(depth + 1) {
                    rep.insert(key, nested.into_value());
                }
            }
            Branch::Fallback(fallback) => {
                tracing::debug!(path = %step.path, depth = depth + 1, ?fallback, "nested path kept the rendered value");
            }
        }
        Ok(rep)
    }
}

/// Merge `item` into `base` along `keys` (the path segments after the field).
///
/// Intermediate keys are descended; the final key is copied when its value
/// differs. Collections pair elements by `identity_field`, falling back to
/// position for elements without one.
pub fn merge_expanded(base: &mut Expanded, item: &Expanded, keys: &[String], identity_field: &str) {
    match (base, item) {
        (Expanded::One(base), Expanded::One(item)) => {
            merge_map(base.as_map_mut(), item.as_map(), keys, identity_field);
        }
        (Expanded::Many(base), Expanded::Many(items)) => {
            for (position, rep) in base.iter_mut().enumerate() {
                let partner = match rep.get(identity_field) {
                    Some(id) => items.iter().find(|other| other.get(identity_field) == Some(id)),
                    None => items.get(position),
                };
                if let Some(partner) = partner {
                    merge_map(rep.as_map_mut(), partner.as_map(), keys, identity_field);
                }
            }
        }
        _ => {}
    }
}

fn merge_map(base: &mut Map<String, Value>, item: &Map<String, Value>, keys: &[String], identity_field: &str) {
    let Some((key, rest)) = keys.split_first() else {
        return;
    };
    let Some(incoming) = item.get(key) else {
        return;
    };

    if rest.is_empty() {
        if base.get(key) != Some(incoming) {
            base.insert(key.clone(), incoming.clone());
        }
        return;
    }

    let descend = base.get(key).is_some_and(|existing| is_expanded_as(existing, incoming));
    if descend {
        if let Some(existing) = base.get_mut(key) {
            merge_value(existing, incoming, rest, identity_field);
        }
    } else if incoming.is_object() || incoming.is_array() {
        // Base still holds a reference at this level; take the item's expansion whole.
        base.insert(key.clone(), incoming.clone());
    }
}

/// Whether `existing` is already an expansion of the same shape as `incoming`.
///
/// Reference lists (ids) are arrays too, but only arrays of objects descend.
fn is_expanded_as(existing: &Value, incoming: &Value) -> bool {
    match (existing, incoming) {
        (Value::Object(_), Value::Object(_)) => true,
        (Value::Array(existing), Value::Array(_)) => existing.iter().all(Value::is_object),
        _ => false,
    }
}

fn merge_value(base: &mut Value, item: &Value, keys: &[String], identity_field: &str) {
    match (base, item) {
        (Value::Object(base), Value::Object(item)) => merge_map(base, item, keys, identity_field),
        (Value::Array(base), Value::Array(items)) => {
            for (position, element) in base.iter_mut().enumerate() {
                let partner = match element.get(identity_field) {
                    Some(id) => items.iter().find(|other| other.get(identity_field) == Some(id)),
                    None => items.get(position),
                };
                if let (Value::Object(element), Some(Value::Object(partner))) = (element, partner) {
                    merge_map(element, partner, keys, identity_field);
                }
            }
        }
        _ => {}
    }
}
