//! Object-graph access.
//!
//! The kernel never owns data. It walks the graph through two narrow
//! capabilities supplied by the data layer:
//!
//! - [`RelationAccessor`]: follow one edge of a live instance
//! - [`TypeGraph`]: describe the declared relation fields of an entity type
//!
//! Both are synchronous; accessor calls may block on the data source.

pub mod memory;

use crate::types::{EntityType, RelationField};

/// Value of one relation edge on a live instance.
#[derive(Debug, Clone, PartialEq)]
pub enum Related<I> {
    /// A single related object.
    One(I),
    /// A collection; re-iterable, in data-layer order.
    Many(Vec<I>),
    /// No related object (null foreign key, missing row).
    Absent,
}

/// Walks one graph edge on a live instance.
pub trait RelationAccessor: Send + Sync {
    /// Handle to a live object.
    type Instance: Clone;

    /// Error type for accessor operations.
    type Error: std::error::Error + Send + Sync;

    /// Entity type of an instance.
    fn type_of(&self, instance: &Self::Instance) -> EntityType;

    /// Fetch the related object or collection behind `field_name`.
    fn get_related(
        &self,
        instance: &Self::Instance,
        field_name: &str,
    ) -> Result<Related<Self::Instance>, Self::Error>;
}

/// Describes the declared relations of each entity type.
pub trait TypeGraph: Send + Sync {
    /// Relation fields declared on `entity_type`, forward and reverse.
    fn relation_fields_of(&self, entity_type: &EntityType) -> Vec<RelationField>;

    /// Find the relation a path segment names, honouring `<target>_set`.
    fn relation_named(&self, entity_type: &EntityType, segment: &str) -> Option<RelationField> {
        let fields = self.relation_fields_of(entity_type);
        fields
            .iter()
            .find(|f| f.name == segment)
            .or_else(|| fields.iter().find(|f| f.answers_to(segment)))
            .cloned()
    }
}

pub use memory::{Entity, GraphDocument, InMemoryError, InMemoryGraph, Link, RelationSchema};
