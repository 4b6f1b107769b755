//! Named configuration overrides.
//!
//! Each override is a pure `(FormatConfig, &BuildConfiguration) -> FormatConfig`
//! function. Build options list them by name; they run left to right after the
//! base composition of every format.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use libroll_config::BuildConfiguration;

use crate::pipeline::FormatConfig;
use crate::{Error, Result};

pub type OverrideFn = Arc<dyn Fn(FormatConfig, &BuildConfiguration) -> FormatConfig + Send + Sync>;

#[derive(Clone)]
pub struct OverrideRegistry {
    overrides: IndexMap<String, OverrideFn>,
}

impl Default for OverrideRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRegistry")
            .field("overrides", &self.overrides.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OverrideRegistry {
    /// Registry with the built-in `sourcemap` and `minify` overrides.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("sourcemap", |mut config, _| {
            config.sourcemap = true;
            config
        });
        registry.register("minify", |mut config, _| {
            config.minify = true;
            config
        });
        registry
    }

    /// Registry without the built-in overrides.
    pub fn empty() -> Self {
        Self {
            overrides: IndexMap::new(),
        }
    }

    /// Register (or replace) an override.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(FormatConfig, &BuildConfiguration) -> FormatConfig + Send + Sync + 'static,
    {
        self.overrides.insert(name.into(), Arc::new(f));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.overrides.contains_key(name)
    }

    /// Look up every name, failing on the first unknown one.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<OverrideFn>> {
        names
            .iter()
            .map(|name| {
                self.overrides
                    .get(name)
                    .cloned()
                    .ok_or_else(|| Error::UnknownOverride(name.clone()))
            })
            .collect()
    }
}

/// Fold `chain` over `config` in order.
pub fn apply_chain(
    chain: &[OverrideFn],
    config: FormatConfig,
    build: &BuildConfiguration,
) -> FormatConfig {
    chain.iter().fold(config, |acc, f| f(acc, build))
}
