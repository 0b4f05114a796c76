//! Representation orchestrator.
//!
//! Renders an instance with its root renderer, reads the expansion parameter
//! from the request, and substitutes each configured field's default value
//! with its expansion.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::ExpansionConfig;
use crate::expander::{ExpandError, ExpansionBuilder};
use crate::normalize::normalize;
use crate::policy::PolicyTable;
use crate::renderer::{RendererRef, RendererRegistry, RendererResolver, RequestContext};
use crate::store::{RelationAccessor, TypeGraph};
use crate::types::{EntityType, FieldPath, Multiplicity, Representation};

/// Entry point: renders instances and expands requested paths.
///
/// ## Example
///
/// ```ignore
/// let engine = ExpansionEngine::new(graph.clone(), graph, table, registry, ExpansionConfig::default());
/// let request = RequestContext::new().with_param("expand", "customer,items");
/// let rep = engine.represent(&order, &RendererRef::new("order"), &request)?;
/// ```
pub struct ExpansionEngine<A: RelationAccessor, T: TypeGraph> {
    accessor: Arc<A>,
    table: Arc<PolicyTable>,
    resolver: Arc<RendererResolver<A::Instance>>,
    builder: ExpansionBuilder<A, T>,
    config: ExpansionConfig,
}

impl<A: RelationAccessor, T: TypeGraph> ExpansionEngine<A, T> {
    /// Create an engine; the renderer cache is sized from `config`.
    pub fn new(
        accessor: Arc<A>,
        graph: Arc<T>,
        table: Arc<PolicyTable>,
        registry: Arc<dyn RendererRegistry<A::Instance>>,
        config: ExpansionConfig,
    ) -> Self {
        let resolver = Arc::new(RendererResolver::with_config(registry, &config.renderer_cache));
        Self::with_resolver(accessor, graph, table, resolver, config)
    }

    /// Create an engine sharing an existing renderer resolver.
    pub fn with_resolver(
        accessor: Arc<A>,
        graph: Arc<T>,
        table: Arc<PolicyTable>,
        resolver: Arc<RendererResolver<A::Instance>>,
        config: ExpansionConfig,
    ) -> Self {
        let builder = ExpansionBuilder::new(Arc::clone(&accessor), graph, Arc::clone(&resolver), &config);
        Self {
            accessor,
            table,
            resolver,
            builder,
            config,
        }
    }

    /// The renderer resolver (shared cache).
    pub fn resolver(&self) -> &Arc<RendererResolver<A::Instance>> {
        &self.resolver
    }

    /// The policy table.
    pub fn table(&self) -> &PolicyTable {
        &self.table
    }

    /// Engine configuration.
    pub fn config(&self) -> &ExpansionConfig {
        &self.config
    }

    /// Whether the request carries a non-empty expansion parameter.
    pub fn has_param(&self, request: &RequestContext) -> bool {
        request
            .param(&self.config.query_param)
            .is_some_and(|raw| !raw.trim().is_empty())
    }

    /// Render `instance` with `renderer` and expand the requested paths.
    pub fn represent(
        &self,
        instance: &A::Instance,
        renderer: &RendererRef,
        request: &RequestContext,
    ) -> Result<Representation, ExpandError> {
        let root = self.accessor.type_of(instance);
        let resolved = self.resolver.resolve(renderer)?;
        let mut rep = self
            .resolver
            .construct(resolved, request, Multiplicity::One, BTreeSet::new())
            .render_one(instance)?;

        let paths = self.requested_paths(&root, request)?;
        if paths.is_empty() {
            return Ok(rep);
        }

        let mut unmatched = paths.clone();
        for policy in self.table.fields_of(&root) {
            let matched: BTreeSet<FieldPath> = paths.iter().filter(|p| policy.is_matching(p)).cloned().collect();
            if matched.is_empty() {
                continue;
            }
            unmatched.retain(|p| !matched.contains(p));

            if let Some(expanded) = self.builder.expand(instance, policy, &matched, request)? {
                rep.insert(policy.field(), expanded.into_value());
            }
        }

        for path in &unmatched {
            tracing::debug!(path = %path, entity_type = %root, "requested path matches no expandable field");
        }

        Ok(rep)
    }

    /// [`represent`](Self::represent) each instance in order.
    pub fn represent_many(
        &self,
        instances: &[A::Instance],
        renderer: &RendererRef,
        request: &RequestContext,
    ) -> Result<Vec<Representation>, ExpandError> {
        instances
            .iter()
            .map(|instance| self.represent(instance, renderer, request))
            .collect()
    }

    /// Normalized paths requested for `root`, bounded by the depth limit.
    pub fn requested_paths(
        &self,
        root: &EntityType,
        request: &RequestContext,
    ) -> Result<BTreeSet<FieldPath>, ExpandError> {
        let paths = normalize(request.param(&self.config.query_param), root);

        if let Some(max_depth) = self.config.max_depth {
            if let Some(path) = paths.iter().find(|p| p.len() - 1 > max_depth) {
                return Err(ExpandError::PathTooDeep {
                    path: path.clone(),
                    depth: path.len() - 1,
                    max_depth,
                });
            }
        }

        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyDeclaration, SpecificationEntry};
    use crate::renderer::{AttributeRenderer, StaticRegistry};
    use crate::store::{Entity, InMemoryGraph, RelationSchema};
    use crate::types::RelationField;
    use serde_json::json;
    use uuid::Uuid;

    fn engine(config: ExpansionConfig) -> (ExpansionEngine<InMemoryGraph, InMemoryGraph>, Arc<Entity>) {
        let mut schema = RelationSchema::new();
        schema
            .declare("order", RelationField::new("customer", "customer", Multiplicity::One))
            .declare("customer", RelationField::new("profile", "profile", Multiplicity::One));

        let mut graph = InMemoryGraph::new(schema);
        let order = graph.add(
            Entity::new(Uuid::from_u128(1), "order")
                .with_attr("total", 12)
                .with_one("customer", Some(Uuid::from_u128(2))),
        );
        graph.add(
            Entity::new(Uuid::from_u128(2), "customer")
                .with_attr("name", "Ada")
                .with_one("profile", None),
        );
        let graph = Arc::new(graph);

        let mut table = PolicyTable::new();
        table
            .declare(
                "order",
                "customer",
                &PolicyDeclaration::new().entry(SpecificationEntry::new(["customer"], "customer")),
            )
            .unwrap();

        let registry: StaticRegistry<Arc<Entity>> = StaticRegistry::new()
            .register("order", AttributeRenderer::new())
            .register("customer", AttributeRenderer::new());

        let engine = ExpansionEngine::new(Arc::clone(&graph), graph, Arc::new(table), Arc::new(registry), config);
        (engine, order)
    }

    #[test]
    fn test_no_param_renders_default() {
        let (engine, order) = engine(ExpansionConfig::default());
        let request = RequestContext::new();
        assert!(!engine.has_param(&request));

        let rep = engine.represent(&order, &RendererRef::new("order"), &request).unwrap();
        assert_eq!(rep.get("customer"), Some(&json!(Uuid::from_u128(2).to_string())));
    }

    #[test]
    fn test_expand_substitutes_field() {
        let (engine, order) = engine(ExpansionConfig::default());
        let request = RequestContext::new().with_param("expand", "customer");
        assert!(engine.has_param(&request));

        let rep = engine.represent(&order, &RendererRef::new("order"), &request).unwrap();
        let customer = rep.get("customer").unwrap();
        assert_eq!(customer["name"], json!("Ada"));
        assert_eq!(rep.get("total"), Some(&json!(12)));
    }

    #[test]
    fn test_custom_query_param() {
        let config = ExpansionConfig {
            query_param: "include".to_string(),
            ..ExpansionConfig::default()
        };
        let (engine, order) = engine(config);
        let request = RequestContext::new().with_param("expand", "customer");
        let rep = engine.represent(&order, &RendererRef::new("order"), &request).unwrap();
        assert!(rep.get("customer").unwrap().is_string());

        let request = RequestContext::new().with_param("include", "customer");
        let rep = engine.represent(&order, &RendererRef::new("order"), &request).unwrap();
        assert!(rep.get("customer").unwrap().is_object());
    }

    #[test]
    fn test_unmatched_paths_are_ignored() {
        let (engine, order) = engine(ExpansionConfig::default());
        let request = RequestContext::new().with_param("expand", "shipment.carrier");
        let rep = engine.represent(&order, &RendererRef::new("order"), &request).unwrap();
        assert!(!rep.contains_key("shipment"));
    }

    #[test]
    fn test_depth_limit() {
        let config = ExpansionConfig {
            max_depth: Some(1),
            ..ExpansionConfig::default()
        };
        let (engine, order) = engine(config);
        let request = RequestContext::new().with_param("expand", "customer.profile");
        let err = engine.represent(&order, &RendererRef::new("order"), &request).unwrap_err();
        match err {
            ExpandError::PathTooDeep { depth, max_depth, .. } => {
                assert_eq!(depth, 2);
                assert_eq!(max_depth, 1);
            }
            other => panic!("expected PathTooDeep, got {other:?}"),
        }
    }

    #[test]
    fn test_represent_many() {
        let (engine, order) = engine(ExpansionConfig::default());
        let request = RequestContext::new().with_param("expand", "customer");
        let reps = engine
            .represent_many(&[Arc::clone(&order), order], &RendererRef::new("order"), &request)
            .unwrap();
        assert_eq!(reps.len(), 2);
        assert_eq!(reps[0], reps[1]);
    }
}
