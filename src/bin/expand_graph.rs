//! Expand Graph CLI
//!
//! Loads a JSON document holding an object graph, its expansion policies and
//! renderer settings, then prints the representation of one entity with the
//! requested paths expanded.
//!
//! ## Document
//!
//! ```json
//! {
//!   "graph": {"schema": {...}, "entities": [...]},
//!   "policies": {"order": [{"field": "customer", "allowed": [], "specification": [...]}]},
//!   "renderers": {"order": {}, "customer": {"only": ["uuid", "name"]}},
//!   "root": {"entity": "<uuid>", "renderer": "order"},
//!   "config": {"max_depth": 4}
//! }
//! ```
//!
//! ## Configuration
//!
//! Environment variables:
//! - `EXPAND_QUERY_PARAM`, `EXPAND_IDENTITY_FIELD`, `EXPAND_MAX_DEPTH`, `EXPAND_CACHE_ENTRIES`:
//!   engine settings, used when the document carries no `config`. Renderers
//!   without their own `identity_field` emit the configured one, so list
//!   merges pair elements by the key the renderers actually produce.
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin expand_graph -- document.json "customer,items.product"
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use expansion_kernel::policy::TableDeclaration;
use expansion_kernel::renderer::ResolverStats;
use expansion_kernel::store::GraphDocument;
use expansion_kernel::{
    AttributeRenderer, Entity, ExpansionConfig, ExpansionEngine, InMemoryGraph, PolicyTable, RendererRef,
    Representation, RequestContext, StaticRegistry,
};

type BoxError = Box<dyn std::error::Error>;

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "expand_graph=info,expansion_kernel=info".into());

    // Logs go to stderr so stdout carries only the representation
    if log_format == "pretty" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

#[derive(Debug, Deserialize)]
struct RendererSettings {
    #[serde(default)]
    identity_field: Option<String>,
    #[serde(default)]
    only: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RootSelection {
    entity: Uuid,
    renderer: RendererRef,
}

#[derive(Debug, Deserialize)]
struct Document {
    graph: GraphDocument,
    #[serde(default)]
    policies: TableDeclaration,
    #[serde(default)]
    renderers: BTreeMap<String, RendererSettings>,
    root: RootSelection,
    #[serde(default)]
    config: Option<ExpansionConfig>,
}

fn registry(renderers: BTreeMap<String, RendererSettings>, identity_field: &str) -> StaticRegistry<Arc<Entity>> {
    renderers.into_iter().fold(StaticRegistry::new(), |registry, (name, settings)| {
        let identity = settings.identity_field.unwrap_or_else(|| identity_field.to_string());
        let mut renderer = AttributeRenderer::new().with_identity_field(identity);
        if let Some(only) = settings.only {
            renderer = renderer.only(only);
        }
        registry.register(name, renderer)
    })
}

/// Build the engine for `document` and represent its root entity.
fn expand_document(document: Document, expand: String) -> Result<(Representation, ResolverStats), BoxError> {
    let config = match document.config {
        Some(config) => config,
        None => ExpansionConfig::from_env()?,
    };

    let graph = Arc::new(InMemoryGraph::from_document(document.graph));
    let table = Arc::new(PolicyTable::from_declarations(&document.policies)?);
    let registry = Arc::new(registry(document.renderers, &config.identity_field));

    info!(
        entities = graph.num_entities(),
        policies = table.len(),
        renderers = registry.len(),
        identity_field = %config.identity_field,
        "document loaded"
    );

    let root = graph
        .get(&document.root.entity)
        .ok_or_else(|| format!("root entity {} is not in the graph", document.root.entity))?;

    let request = RequestContext::new().with_param(config.query_param.clone(), expand);
    let engine = ExpansionEngine::new(Arc::clone(&graph), Arc::clone(&graph), table, registry, config);
    let representation = engine.represent(&root, &document.root.renderer, &request)?;
    Ok((representation, engine.resolver().stats()))
}

fn main() -> Result<(), BoxError> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let document_path = args
        .next()
        .ok_or("usage: expand_graph <document.json> [comma-separated paths]")?;
    let expand = args.next().unwrap_or_default();

    let raw = std::fs::read_to_string(&document_path)?;
    let document: Document = serde_json::from_str(&raw)?;
    let (representation, stats) = expand_document(document, expand)?;

    info!(
        document = %document_path,
        cached_renderers = stats.len,
        cache_hits = stats.hits,
        registry_lookups = stats.lookups,
        "representation built"
    );

    println!("{}", serde_json::to_string_pretty(&representation)?);
    Ok(())
}
