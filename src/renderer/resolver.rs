//! Renderer resolution with a process-lifetime cache.
//!
//! ## Purpose
//!
//! Specification entries reference renderers by name. Looking a name up may
//! be expensive (registry scans, plugin loading), so the first resolution of
//! a reference is cached and every later resolution returns the cached value
//! unchanged.
//!
//! ## Concurrency
//!
//! Resolution is a pure function of the reference. Concurrent first-time
//! resolutions may race to the registry; the first writer wins and the
//! others adopt its value, so all callers converge on one renderer. Values
//! are fully constructed before they enter the cache.
//!
//! ## Failure
//!
//! An unknown reference is a configuration defect. It is reported, never
//! cached, and never retried internally.

use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;

use super::{BoundRenderer, Renderer, RendererRef, RequestContext};
use crate::config::CacheConfig;
use crate::types::{FieldPath, Multiplicity};

/// Fatal configuration defects found while rendering.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// No renderer is registered under the reference.
    #[error("Failed to find a renderer for '{0}'")]
    UnknownRenderer(RendererRef),
    /// No specification entry covers a path that has to be rendered.
    #[error("There is no specification for '{path}' on {field}. Add an entry with paths: ['{path}']")]
    MissingSpecification {
        /// Path that needed rendering.
        path: FieldPath,
        /// Field whose policy was consulted.
        field: String,
    },
}

/// Looks renderers up by reference.
pub trait RendererRegistry<I>: Send + Sync {
    /// Find the renderer behind `reference`.
    fn lookup(&self, reference: &RendererRef) -> Option<Arc<dyn Renderer<I>>>;
}

/// Registry backed by a fixed map.
pub struct StaticRegistry<I> {
    renderers: HashMap<RendererRef, Arc<dyn Renderer<I>>>,
}

impl<I> StaticRegistry<I> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Register `renderer` under `reference`.
    pub fn register<R>(mut self, reference: impl Into<RendererRef>, renderer: R) -> Self
    where
        R: Renderer<I> + 'static,
    {
        self.renderers.insert(reference.into(), Arc::new(renderer));
        self
    }

    /// Number of registered renderers.
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

impl<I> Default for StaticRegistry<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> RendererRegistry<I> for StaticRegistry<I> {
    fn lookup(&self, reference: &RendererRef) -> Option<Arc<dyn Renderer<I>>> {
        self.renderers.get(reference).cloned()
    }
}

/// Resolver statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverStats {
    /// Current number of cached renderers (0 when caching is disabled).
    pub len: usize,
    /// Cache capacity (0 when caching is disabled).
    pub cap: usize,
    /// Resolutions served from the cache.
    pub hits: u64,
    /// Resolutions that consulted the registry.
    pub lookups: u64,
}

/// Resolves renderer references through a registry, caching results.
///
/// Thread-safe; share it behind an `Arc` for the life of the process.
pub struct RendererResolver<I> {
    registry: Arc<dyn RendererRegistry<I>>,
    cache: Option<RwLock<LruCache<RendererRef, Arc<dyn Renderer<I>>>>>,
    hits: AtomicU64,
    lookups: AtomicU64,
}

impl<I> RendererResolver<I> {
    /// Create a resolver with the default cache configuration.
    pub fn new(registry: Arc<dyn RendererRegistry<I>>) -> Self {
        Self::with_config(registry, &CacheConfig::default())
    }

    /// Create a resolver with a custom cache configuration.
    pub fn with_config(registry: Arc<dyn RendererRegistry<I>>, config: &CacheConfig) -> Self {
        let cache = config.enabled.then(|| {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            RwLock::new(LruCache::new(size))
        });

        Self {
            registry,
            cache,
            hits: AtomicU64::new(0),
            lookups: AtomicU64::new(0),
        }
    }

    /// Resolve a reference to its renderer.
    pub fn resolve(&self, reference: &RendererRef) -> Result<Arc<dyn Renderer<I>>, ConfigurationError> {
        if let Some(cache) = &self.cache {
            // Read lock first (non-blocking for other readers)
            if let Some(renderer) = cache.read().peek(reference) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(renderer = %reference, "renderer cache hit");
                return Ok(Arc::clone(renderer));
            }
        }

        self.lookups.fetch_add(1, Ordering::Relaxed);
        let renderer = self
            .registry
            .lookup(reference)
            .ok_or_else(|| ConfigurationError::UnknownRenderer(reference.clone()))?;

        if let Some(cache) = &self.cache {
            let mut cache = cache.write();
            if let Some(existing) = cache.get(reference) {
                return Ok(Arc::clone(existing));
            }
            cache.put(reference.clone(), Arc::clone(&renderer));
            tracing::debug!(renderer = %reference, "renderer resolved and cached");
        }

        Ok(renderer)
    }

    /// Bind a resolved renderer to per-call settings.
    pub fn construct<'a>(
        &self,
        renderer: Arc<dyn Renderer<I>>,
        request: &'a RequestContext,
        multiplicity: Multiplicity,
        omitted_fields: BTreeSet<String>,
    ) -> BoundRenderer<'a, I> {
        BoundRenderer::new(renderer, request, multiplicity, omitted_fields)
    }

    /// Current statistics.
    pub fn stats(&self) -> ResolverStats {
        let (len, cap) = self
            .cache
            .as_ref()
            .map(|cache| {
                let cache = cache.read();
                (cache.len(), cache.cap().get())
            })
            .unwrap_or((0, 0));

        ResolverStats {
            len,
            cap,
            hits: self.hits.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
        }
    }

    /// Drop every cached renderer. Does nothing if caching is disabled.
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}
