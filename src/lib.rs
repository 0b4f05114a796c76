//! # expansion-kernel
//!
//! Policy-gated, recursive expansion of relational object graphs.
//!
//! The kernel answers one question:
//!
//! > Given an instance and the paths a client asked for, which related
//! > objects may be **expanded in place**, and with which renderer?
//!
//! ## Core Contract
//!
//! 1. Normalize the client's comma-separated, dot-delimited paths
//! 2. Check every path against the field's allow-list and specification table
//! 3. Walk the relation graph, render each level, recurse into the remainder
//! 4. Merge sibling paths of one field into a single nested representation
//!
//! ## Architecture
//!
//! ```text
//! RequestContext → normalize → PolicyTable → ExpansionBuilder → Representation
//!                                   ↓              ↓       ↓
//!                              FieldPolicy   GraphWalker  RendererResolver
//!                                                 ↓
//!                                   RelationAccessor + TypeGraph (in-memory or caller-supplied)
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same instance + same policy + same graph state → identical representation
//! - Requested paths are processed in canonical (sorted) order
//! - Representations compare and hash structurally, independent of key order

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod canonical;
pub mod config;
pub mod cycle;
pub mod expander;
pub mod normalize;
pub mod policy;
pub mod renderer;
pub mod representer;
pub mod store;
pub mod walker;

// Re-exports
pub use types::{EntityType, Expanded, FieldPath, Multiplicity, RelationField, Representation};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use config::{CacheConfig, ConfigError, ExpansionConfig};
pub use cycle::{CycleGuard, ResolutionChain};
pub use expander::{Branch, ExpandError, ExpansionBuilder, Fallback};
pub use normalize::{normalize, remove_redundant_paths};
pub use policy::{
    DeclarationError, FieldPolicy, PolicyDeclaration, PolicyTable, PolicyViolation, SpecificationEntry,
};
pub use renderer::{
    AttributeRenderer, ConfigurationError, RenderContext, RenderError, Renderer, RendererRef, RendererRegistry,
    RendererResolver, RequestContext, StaticRegistry,
};
pub use representer::ExpansionEngine;
pub use store::{Entity, InMemoryGraph, Related, RelationAccessor, RelationSchema, TypeGraph};
pub use walker::{GraphWalker, PathParts, Walk};

/// Default name of the query parameter holding requested paths.
pub const DEFAULT_QUERY_PARAM: &str = "expand";

/// Default field used to pair list elements when merging.
pub const DEFAULT_IDENTITY_FIELD: &str = "uuid";
