//! Generic renderer for in-memory entities.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;

use super::{RenderContext, RenderError, Renderer};
use crate::store::Entity;
use crate::types::Representation;
use crate::DEFAULT_IDENTITY_FIELD;

/// Renders an [`Entity`]: identity, attributes, then relations as references.
///
/// Field selection mirrors dynamic-fields serializers: an optional `only`
/// list restricts the output, and the context's omitted fields are dropped.
#[derive(Debug, Clone)]
pub struct AttributeRenderer {
    identity_field: String,
    only: Option<BTreeSet<String>>,
}

impl AttributeRenderer {
    /// Renderer emitting every field, identity under `uuid`.
    pub fn new() -> Self {
        Self {
            identity_field: DEFAULT_IDENTITY_FIELD.to_string(),
            only: None,
        }
    }

    /// Emit the identity under another key.
    pub fn with_identity_field(mut self, name: impl Into<String>) -> Self {
        self.identity_field = name.into();
        self
    }

    /// Emit only the listed fields.
    pub fn only<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    fn keeps(&self, field: &str, ctx: &RenderContext<'_>) -> bool {
        if ctx.is_omitted(field) {
            return false;
        }
        self.only.as_ref().map_or(true, |only| only.contains(field))
    }
}

impl Default for AttributeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer<Arc<Entity>> for AttributeRenderer {
    fn render(&self, object: &Arc<Entity>, ctx: &RenderContext<'_>) -> Result<Representation, RenderError> {
        let mut rep = Representation::new();

        if self.keeps(&self.identity_field, ctx) {
            rep.insert(self.identity_field.clone(), Value::String(object.id.to_string()));
        }
        for (name, value) in &object.attributes {
            if self.keeps(name, ctx) {
                rep.insert(name.clone(), value.clone());
            }
        }
        for (name, link) in &object.relations {
            if self.keeps(name, ctx) {
                rep.insert(name.clone(), link.to_value());
            }
        }

        Ok(rep)
    }
}
