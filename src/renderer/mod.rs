//! Renderers turn live instances into representations.
//!
//! Specification entries name renderers symbolically ([`RendererRef`]). The
//! [`resolver`] turns a reference into a shared renderer once and caches it;
//! [`BoundRenderer`] pairs a resolved renderer with per-call settings
//! (request, multiplicity, omitted fields).

pub mod attributes;
pub mod resolver;

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Multiplicity, Representation};

pub use attributes::AttributeRenderer;
pub use resolver::{ConfigurationError, RendererRegistry, RendererResolver, ResolverStats, StaticRegistry};

/// Symbolic renderer reference, as written in specification entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RendererRef(String);

impl RendererRef {
    /// Create a reference.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Reference name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RendererRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RendererRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for RendererRef {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Request-scoped context handed to every renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Query parameters of the request.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
}

impl RequestContext {
    /// Empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with a single query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Value of a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Settings a renderer sees for one render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    /// The request being served.
    pub request: &'a RequestContext,
    /// Multiplicity declared for the rendered path.
    pub multiplicity: Multiplicity,
    /// Fields to leave out.
    pub omitted_fields: &'a BTreeSet<String>,
}

impl RenderContext<'_> {
    /// Whether `field` must be left out.
    pub fn is_omitted(&self, field: &str) -> bool {
        self.omitted_fields.contains(field)
    }
}

/// Error raised by a renderer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Renderer '{renderer}' failed: {message}")]
pub struct RenderError {
    /// Renderer that failed.
    pub renderer: String,
    /// What went wrong.
    pub message: String,
}

impl RenderError {
    /// Create a render error.
    pub fn new(renderer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            renderer: renderer.into(),
            message: message.into(),
        }
    }
}

/// Produces the representation of one instance.
pub trait Renderer<I>: Send + Sync {
    /// Render `object`, honouring `ctx.omitted_fields`.
    fn render(&self, object: &I, ctx: &RenderContext<'_>) -> Result<Representation, RenderError>;
}

impl<I, F> Renderer<I> for F
where
    F: Fn(&I, &RenderContext<'_>) -> Result<Representation, RenderError> + Send + Sync,
{
    fn render(&self, object: &I, ctx: &RenderContext<'_>) -> Result<Representation, RenderError> {
        self(object, ctx)
    }
}

/// A resolved renderer bound to one request, multiplicity, and omitted set.
pub struct BoundRenderer<'a, I> {
    renderer: Arc<dyn Renderer<I>>,
    request: &'a RequestContext,
    multiplicity: Multiplicity,
    omitted_fields: BTreeSet<String>,
}

impl<'a, I> BoundRenderer<'a, I> {
    /// Bind `renderer` to per-call settings.
    pub fn new(
        renderer: Arc<dyn Renderer<I>>,
        request: &'a RequestContext,
        multiplicity: Multiplicity,
        omitted_fields: BTreeSet<String>,
    ) -> Self {
        Self {
            renderer,
            request,
            multiplicity,
            omitted_fields,
        }
    }

    /// Multiplicity this renderer was bound with.
    pub fn multiplicity(&self) -> Multiplicity {
        self.multiplicity
    }

    fn context(&self) -> RenderContext<'_> {
        RenderContext {
            request: self.request,
            multiplicity: self.multiplicity,
            omitted_fields: &self.omitted_fields,
        }
    }

    /// Render one object.
    pub fn render_one(&self, object: &I) -> Result<Representation, RenderError> {
        let ctx = self.context();
        let mut rep = self.renderer.render(object, &ctx)?;
        for field in &self.omitted_fields {
            rep.remove(field);
        }
        Ok(rep)
    }

    /// Render each element of a collection independently.
    pub fn render_many(&self, objects: &[I]) -> Result<Vec<Representation>, RenderError> {
        objects.iter().map(|object| self.render_one(object)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo(object: &u32, _ctx: &RenderContext<'_>) -> Result<Representation, RenderError> {
        let mut rep = Representation::new();
        rep.insert("id", json!(object));
        rep.insert("secret", json!("x"));
        Ok(rep)
    }

    #[test]
    fn test_bound_renderer_strips_omitted() {
        let request = RequestContext::new();
        let renderer: Arc<dyn Renderer<u32>> = Arc::new(echo);
        let bound = BoundRenderer::new(renderer, &request, Multiplicity::Many, BTreeSet::from(["secret".to_string()]));

        let reps = bound.render_many(&[1, 2]).unwrap();
        assert_eq!(reps.len(), 2);
        assert_eq!(reps[1].get("id"), Some(&json!(2)));
        assert!(!reps[0].contains_key("secret"));
        assert_eq!(bound.multiplicity(), Multiplicity::Many);
    }

    #[test]
    fn test_request_param() {
        let request = RequestContext::new().with_param("expand", "customer");
        assert_eq!(request.param("expand"), Some("customer"));
        assert_eq!(request.param("fields"), None);
    }
}
