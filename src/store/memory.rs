//! In-memory object graph for testing and for the CLI.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{Related, RelationAccessor, TypeGraph};
use crate::types::{EntityType, RelationField};

/// Error type for in-memory graph.
#[derive(Debug, thiserror::Error)]
pub enum InMemoryError {
    /// Entity not found.
    #[error("Entity not found: {0}")]
    EntityNotFound(Uuid),
    /// Relation not declared on the entity's type.
    #[error("Unknown relation '{field}' on {entity_type}")]
    UnknownRelation {
        /// Owning type.
        entity_type: EntityType,
        /// Requested field.
        field: String,
    },
    /// Graph document could not be parsed.
    #[error("Invalid graph document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Declared relation fields per entity type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationSchema {
    types: BTreeMap<EntityType, Vec<RelationField>>,
}

impl RelationSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation field on `entity_type`.
    pub fn declare(&mut self, entity_type: impl Into<EntityType>, field: RelationField) -> &mut Self {
        self.types.entry(entity_type.into()).or_default().push(field);
        self
    }

    /// Relation fields of `entity_type` (empty when unknown).
    pub fn fields(&self, entity_type: &EntityType) -> &[RelationField] {
        self.types.get(entity_type).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Stored value of a relation on an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    /// Collection of related entity ids.
    Many(Vec<Uuid>),
    /// Single related id, or null.
    One(Option<Uuid>),
}

impl Link {
    /// Whether this link points at `id`.
    pub fn points_at(&self, id: &Uuid) -> bool {
        match self {
            Self::Many(ids) => ids.contains(id),
            Self::One(Some(target)) => target == id,
            Self::One(None) => false,
        }
    }

    /// Reference-only JSON form (ids as strings).
    pub fn to_value(&self) -> Value {
        match self {
            Self::Many(ids) => Value::Array(ids.iter().map(|id| Value::String(id.to_string())).collect()),
            Self::One(Some(id)) => Value::String(id.to_string()),
            Self::One(None) => Value::Null,
        }
    }
}

/// A stored entity: identity, type, scalar attributes, outgoing links.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub id: Uuid,
    /// Entity type.
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Scalar attributes in declaration order.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Forward relation links by field name.
    #[serde(default)]
    pub relations: BTreeMap<String, Link>,
}

impl Entity {
    /// Create an entity with no attributes or links.
    pub fn new(id: Uuid, entity_type: impl Into<EntityType>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            attributes: Map::new(),
            relations: BTreeMap::new(),
        }
    }

    /// Add a scalar attribute.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Add a single-object link.
    pub fn with_one(mut self, field: impl Into<String>, target: Option<Uuid>) -> Self {
        self.relations.insert(field.into(), Link::One(target));
        self
    }

    /// Add a collection link.
    pub fn with_many(mut self, field: impl Into<String>, targets: impl IntoIterator<Item = Uuid>) -> Self {
        self.relations.insert(field.into(), Link::Many(targets.into_iter().collect()));
        self
    }
}

/// Serialized graph: relation schema plus entities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Declared relations per type.
    #[serde(default)]
    pub schema: RelationSchema,
    /// Stored entities.
    #[serde(default)]
    pub entities: Vec<Entity>,
}

/// In-memory object graph.
///
/// Uses BTreeMap for deterministic iteration order; reverse collections are
/// computed by scanning for entities whose forward field links back.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGraph {
    schema: RelationSchema,
    entities: BTreeMap<Uuid, Arc<Entity>>,
}

impl InMemoryGraph {
    /// Create an empty graph over `schema`.
    pub fn new(schema: RelationSchema) -> Self {
        Self {
            schema,
            entities: BTreeMap::new(),
        }
    }

    /// Load a graph from a JSON document `{"schema": {...}, "entities": [...]}`.
    pub fn from_json(json: &str) -> Result<Self, InMemoryError> {
        let doc: GraphDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(doc))
    }

    /// Build a graph from an already parsed document.
    pub fn from_document(doc: GraphDocument) -> Self {
        let mut graph = Self::new(doc.schema);
        for entity in doc.entities {
            graph.add(entity);
        }
        graph
    }

    /// Add (or replace) an entity.
    pub fn add(&mut self, entity: Entity) -> Arc<Entity> {
        let entity = Arc::new(entity);
        self.entities.insert(entity.id, Arc::clone(&entity));
        entity
    }

    /// Fetch an entity by id.
    pub fn get(&self, id: &Uuid) -> Option<Arc<Entity>> {
        self.entities.get(id).cloned()
    }

    /// Schema of the graph.
    pub fn schema(&self) -> &RelationSchema {
        &self.schema
    }

    /// Number of entities.
    pub fn num_entities(&self) -> usize {
        self.entities.len()
    }

    fn entity(&self, id: &Uuid) -> Result<Arc<Entity>, InMemoryError> {
        self.get(id).ok_or(InMemoryError::EntityNotFound(*id))
    }

    fn linking_back(&self, target: &EntityType, forward_field: &str, id: &Uuid) -> Vec<Arc<Entity>> {
        self.entities
            .values()
            .filter(|e| &e.entity_type == target)
            .filter(|e| e.relations.get(forward_field).is_some_and(|link| link.points_at(id)))
            .cloned()
            .collect()
    }
}

impl RelationAccessor for InMemoryGraph {
    type Instance = Arc<Entity>;
    type Error = InMemoryError;

    fn type_of(&self, instance: &Self::Instance) -> EntityType {
        instance.entity_type.clone()
    }

    fn get_related(
        &self,
        instance: &Self::Instance,
        field_name: &str,
    ) -> Result<Related<Self::Instance>, Self::Error> {
        match instance.relations.get(field_name) {
            Some(Link::One(Some(id))) => return Ok(Related::One(self.entity(id)?)),
            Some(Link::One(None)) => return Ok(Related::Absent),
            Some(Link::Many(ids)) => {
                let related = ids.iter().map(|id| self.entity(id)).collect::<Result<_, _>>()?;
                return Ok(Related::Many(related));
            }
            None => {}
        }

        let relation = self
            .relation_named(&instance.entity_type, field_name)
            .ok_or_else(|| InMemoryError::UnknownRelation {
                entity_type: instance.entity_type.clone(),
                field: field_name.to_string(),
            })?;

        match relation.forward_field(&instance.entity_type) {
            Some(forward_field) => Ok(Related::Many(self.linking_back(&relation.target, forward_field, &instance.id))),
            None => Ok(Related::Absent),
        }
    }
}

impl TypeGraph for InMemoryGraph {
    fn relation_fields_of(&self, entity_type: &EntityType) -> Vec<RelationField> {
        self.schema.fields(entity_type).to_vec()
    }
}
