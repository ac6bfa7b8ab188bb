use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::compose::{self, ComposedConfig};
use crate::context::{ResolutionContext, ResolveOptions};
use crate::env;
use crate::error::ConfigError;
use crate::module::{self, ModuleSchema};
use crate::types::Layout;

/// Resolves the composed configuration once and serves it from a single-slot
/// cache afterwards.
///
/// Own one `Resolver` per process (or per test) and hand it to consumers.
/// There is no invalidation: build a new resolver to resolve again.
#[derive(Debug)]
pub struct Resolver {
    options: ResolveOptions,
    cache: OnceCell<Arc<ComposedConfig>>,
}

impl Resolver {
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::new()
    }

    pub fn new(options: ResolveOptions) -> Self {
        Self {
            options,
            cache: OnceCell::new(),
        }
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Whether a resolution has completed and been cached.
    pub fn is_loaded(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Return the composed configuration, resolving it on first use.
    ///
    /// Concurrent first callers block until the single in-flight resolution
    /// finishes. Every later call returns the same `Arc` without touching the
    /// filesystem or the environment. A failed resolution caches nothing.
    pub fn load(&self) -> Result<Arc<ComposedConfig>, ConfigError> {
        let composed = self
            .cache
            .get_or_try_init(|| self.resolve().map(Arc::new))?;
        Ok(Arc::clone(composed))
    }

    /// Typed, validated configuration for one module.
    ///
    /// `defaults` sit under the resolved `modules.<module>` data and lose to it
    /// key by key. Each call re-validates from the cached tree; nothing is
    /// written back to the cache.
    pub fn config_for<C>(&self, module: &str, defaults: Option<Value>) -> Result<C, ConfigError>
    where
        C: ModuleSchema,
        C::Layer: for<'de> Deserialize<'de>,
    {
        let composed = self.load()?;
        module::scope(composed.tree(), module, defaults, self.options.strict)
    }

    fn resolve(&self) -> Result<ComposedConfig, ConfigError> {
        let vars = match &self.options.env_vars {
            Some(vars) => vars.clone(),
            None => process_env(),
        };
        let context = ResolutionContext::compute(&self.options, &vars);
        info!(
            config_dir = %context.config_dir.display(),
            tier = %context.tier,
            node = %context.node,
            "resolving configuration"
        );

        let tree = compose::compose_context(&context);
        let tree = if self.options.no_env {
            tree
        } else {
            env::apply_overrides(
                tree,
                &context.env_prefix,
                vars,
                self.options.normalize_env_keys,
            )?
        };
        Ok(ComposedConfig::new(tree, context))
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(ResolveOptions::default())
    }
}

/// Process environment, skipping variables that are not valid UTF-8.
fn process_env() -> Vec<(String, String)> {
    std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}

/// Builder for a [`Resolver`].
#[derive(Debug, Default)]
pub struct ResolverBuilder {
    options: ResolveOptions,
}

impl ResolverBuilder {
    fn new() -> Self {
        Self::default()
    }

    /// Use this config root instead of `TRP_CONFIG_DIR` or discovery.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.config_dir = Some(dir.into());
        self
    }

    /// Override the tier identifier (default: `TRP_TIER`, then `development`).
    pub fn tier(mut self, tier: &str) -> Self {
        self.options.tier = Some(tier.to_string());
        self
    }

    /// Override the node identifier (default: `TRP_NODE`, `HOSTNAME`, then `local`).
    pub fn node(mut self, node: &str) -> Self {
        self.options.node = Some(node.to_string());
        self
    }

    /// Override the full override-variable prefix (default: `TRP__`).
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.options.env_prefix = Some(prefix.to_string());
        self
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.options.layout = layout;
        self
    }

    /// Disable the environment override layer entirely.
    pub fn no_env(mut self) -> Self {
        self.options.no_env = true;
        self
    }

    /// Read variables from `vars` instead of the process environment.
    pub fn env_vars<K, V>(mut self, vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.options.env_vars = Some(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Start config-root discovery here instead of the current directory.
    pub fn discover_from(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.discover_from = Some(dir.into());
        self
    }

    /// Match override segments against existing keys ignoring `_` and case
    /// (default: `false`). Colliding variables then fail resolution.
    pub fn normalize_env_keys(mut self, normalize: bool) -> Self {
        self.options.normalize_env_keys = normalize;
        self
    }

    /// Enable or disable strict mode (default: `false`).
    /// In strict mode, keys a module schema does not declare are validation errors.
    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn build(self) -> Resolver {
        Resolver::new(self.options)
    }
}

static GLOBAL: OnceCell<Resolver> = OnceCell::new();

/// The process-wide resolver, created with default options on first use.
pub fn global() -> &'static Resolver {
    GLOBAL.get_or_init(Resolver::default)
}

/// Resolve the process-wide configuration.
///
/// `options` only take effect if no process-wide resolver exists yet; later
/// calls return the cached configuration unchanged.
pub fn load_config(options: ResolveOptions) -> Result<Arc<ComposedConfig>, ConfigError> {
    let ignored = GLOBAL.get().is_some() && options != ResolveOptions::default();
    if ignored {
        debug!("process resolver already initialized, ignoring resolve options");
    }
    GLOBAL.get_or_init(|| Resolver::new(options)).load()
}

/// Typed configuration for `module` from the process-wide resolver.
pub fn config_for<C>(module: &str, defaults: Option<Value>) -> Result<C, ConfigError>
where
    C: ModuleSchema,
    C::Layer: for<'de> Deserialize<'de>,
{
    global().config_for(module, defaults)
}
