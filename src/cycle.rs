//! Cycle detection for recursive expansion.
//!
//! A [`ResolutionChain`] records the entity types visited on the way down one
//! requested path. Before following a relation, the builder asks the
//! [`CycleGuard`] whether the relation's target type is already an ancestor;
//! if so, that branch keeps its default representation.

use std::sync::Arc;

use crate::store::TypeGraph;
use crate::types::EntityType;

/// Entity types visited by one top-to-bottom expansion, root first.
///
/// Created fresh for every requested path and discarded afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionChain {
    types: Vec<EntityType>,
}

impl ResolutionChain {
    /// Chain seeded with the root type.
    pub fn seeded(root: EntityType) -> Self {
        Self { types: vec![root] }
    }

    /// Enter a type.
    pub fn push(&mut self, entity_type: EntityType) {
        self.types.push(entity_type);
    }

    /// Leave the most recently entered type.
    pub fn pop(&mut self) -> Option<EntityType> {
        self.types.pop()
    }

    /// Whether `entity_type` is already on the chain.
    pub fn contains(&self, entity_type: &EntityType) -> bool {
        self.types.contains(entity_type)
    }

    /// Number of types on the chain.
    pub fn depth(&self) -> usize {
        self.types.len()
    }

    /// Types on the chain, root first.
    pub fn types(&self) -> &[EntityType] {
        &self.types
    }
}

/// Decides whether following a relation would revisit an ancestor type.
pub struct CycleGuard<T: TypeGraph> {
    graph: Arc<T>,
}

impl<T: TypeGraph> CycleGuard<T> {
    /// Create a guard over `graph`.
    pub fn new(graph: Arc<T>) -> Self {
        Self { graph }
    }

    /// Target type of the relation `segment` names on `owner`.
    ///
    /// Reverse relations answer to `<target>_set` as well as their own name.
    pub fn candidate_type(&self, owner: &EntityType, segment: &str) -> Option<EntityType> {
        self.graph.relation_named(owner, segment).map(|relation| relation.target)
    }

    /// Whether `candidate` already appears on `chain`.
    pub fn would_cycle(&self, candidate: &EntityType, chain: &ResolutionChain) -> bool {
        let cycles = chain.contains(candidate);
        if cycles {
            tracing::debug!(
                candidate = %candidate,
                depth = chain.depth(),
                "relation target already on resolution chain"
            );
        }
        cycles
    }

    /// Whether following `segment` from `owner` would revisit an ancestor.
    ///
    /// Unknown segments never cycle; the walker reports them as gaps.
    pub fn would_cycle_via(&self, owner: &EntityType, segment: &str, chain: &ResolutionChain) -> bool {
        self.candidate_type(owner, segment)
            .is_some_and(|candidate| self.would_cycle(&candidate, chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryGraph, RelationSchema};
    use crate::types::{Multiplicity, RelationField};

    fn guard() -> CycleGuard<InMemoryGraph> {
        let mut schema = RelationSchema::new();
        schema
            .declare("order", RelationField::new("customer", "customer", Multiplicity::One))
            .declare("order", RelationField::new("items", "item", Multiplicity::Many))
            .declare("item", RelationField::new("order", "order", Multiplicity::One))
            .declare("customer", RelationField::reverse("orders", "order"));
        CycleGuard::new(Arc::new(InMemoryGraph::new(schema)))
    }

    #[test]
    fn test_chain_push_pop() {
        let mut chain = ResolutionChain::seeded(EntityType::new("order"));
        chain.push(EntityType::new("item"));
        assert_eq!(chain.depth(), 2);
        assert!(chain.contains(&EntityType::new("item")));
        assert_eq!(chain.pop(), Some(EntityType::new("item")));
        assert!(!chain.contains(&EntityType::new("item")));
    }

    #[test]
    fn test_back_reference_cycles() {
        let guard = guard();
        let mut chain = ResolutionChain::seeded(EntityType::new("order"));
        assert!(!guard.would_cycle_via(&EntityType::new("order"), "items", &chain));

        chain.push(EntityType::new("item"));
        assert!(guard.would_cycle_via(&EntityType::new("item"), "order", &chain));
    }

    #[test]
    fn test_reverse_set_name_cycles() {
        let guard = guard();
        let chain = ResolutionChain::seeded(EntityType::new("order"));
        let customer = EntityType::new("customer");

        assert_eq!(guard.candidate_type(&customer, "order_set"), Some(EntityType::new("order")));
        assert!(guard.would_cycle_via(&customer, "order_set", &chain));
        assert!(guard.would_cycle_via(&customer, "orders", &chain));
    }

    #[test]
    fn test_unknown_segment_does_not_cycle() {
        let guard = guard();
        let chain = ResolutionChain::seeded(EntityType::new("order"));
        assert!(!guard.would_cycle_via(&EntityType::new("order"), "nothing", &chain));
    }
}
