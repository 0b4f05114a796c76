//! Engine configuration.
//!
//! ## Environment
//!
//! [`ExpansionConfig::from_env`] reads:
//! - `EXPAND_QUERY_PARAM`: query parameter holding requested paths (default: `expand`)
//! - `EXPAND_IDENTITY_FIELD`: key pairing list elements during merge (default: `uuid`)
//! - `EXPAND_MAX_DEPTH`: maximum segments after the root; `0` or `none` disables (default: 8)
//! - `EXPAND_CACHE_ENTRIES`: renderer cache capacity; `0` disables the cache (default: 1024)

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_IDENTITY_FIELD, DEFAULT_QUERY_PARAM};

/// Default maximum path depth (segments after the root).
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Configuration for the renderer cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    #[serde(default = "default_cache_entries")]
    pub max_entries: usize,
    /// Whether to enable the cache.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_cache_entries(),
            enabled: true,
        }
    }
}

/// Error reading configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Query parameter holding the comma-separated paths.
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Key used to pair list elements when merging sibling paths.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Maximum segments after the root; `None` means unbounded.
    #[serde(default = "default_max_depth")]
    pub max_depth: Option<usize>,
    /// Renderer cache settings.
    #[serde(default)]
    pub renderer_cache: CacheConfig,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            query_param: default_query_param(),
            identity_field: default_identity_field(),
            max_depth: default_max_depth(),
            renderer_cache: CacheConfig::default(),
        }
    }
}

impl ExpansionConfig {
    /// Defaults overridden by `EXPAND_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `EXPAND_*` name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(param) = lookup("EXPAND_QUERY_PARAM").filter(|v| !v.trim().is_empty()) {
            config.query_param = param.trim().to_string();
        }
        if let Some(field) = lookup("EXPAND_IDENTITY_FIELD").filter(|v| !v.trim().is_empty()) {
            config.identity_field = field.trim().to_string();
        }
        if let Some(raw) = lookup("EXPAND_MAX_DEPTH") {
            config.max_depth = match raw.trim().to_lowercase().as_str() {
                "none" | "0" => None,
                value => Some(parse_usize("EXPAND_MAX_DEPTH", value)?),
            };
        }
        if let Some(raw) = lookup("EXPAND_CACHE_ENTRIES") {
            let entries = parse_usize("EXPAND_CACHE_ENTRIES", raw.trim())?;
            config.renderer_cache = CacheConfig {
                max_entries: entries,
                enabled: entries > 0,
            };
        }

        Ok(config)
    }
}

fn parse_usize(var: &'static str, value: &str) -> Result<usize, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidVar {
        var,
        value: value.to_string(),
    })
}

fn default_query_param() -> String {
    DEFAULT_QUERY_PARAM.to_string()
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

fn default_max_depth() -> Option<usize> {
    Some(DEFAULT_MAX_DEPTH)
}

fn default_cache_entries() -> usize {
    1024
}

fn default_true() -> bool {
    true
}
