use std::path::PathBuf;

use tracing::debug;

use crate::source;
use crate::types::Layout;

/// Prefix shared by every override variable, e.g. `TRP__db__mysql__port`.
pub const DEFAULT_ENV_PREFIX: &str = "TRP__";
/// Overrides the config root directory.
pub const CONFIG_DIR_VAR: &str = "TRP_CONFIG_DIR";
/// Overrides the tier identifier.
pub const TIER_VAR: &str = "TRP_TIER";
/// Overrides the node identifier.
pub const NODE_VAR: &str = "TRP_NODE";
/// Fallback source for the node identifier.
pub const HOSTNAME_VAR: &str = "HOSTNAME";

pub const DEFAULT_CONFIG_DIR: &str = "config";
pub const DEFAULT_TIER: &str = "development";
pub const DEFAULT_NODE: &str = "local";

/// Caller-facing knobs for one resolution. Every field is optional; unset
/// fields fall back to environment variables, discovery, then defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveOptions {
    pub config_dir: Option<PathBuf>,
    pub tier: Option<String>,
    pub node: Option<String>,
    /// Full prefix including its trailing delimiter (default `TRP__`).
    pub env_prefix: Option<String>,
    pub layout: Layout,
    /// Skip the environment override layer.
    pub no_env: bool,
    /// Fixed variable set used instead of the process environment.
    pub env_vars: Option<Vec<(String, String)>>,
    /// Start directory for config-root discovery (default: current directory).
    pub discover_from: Option<PathBuf>,
    /// Match override segments against existing keys ignoring `_` and case.
    pub normalize_env_keys: bool,
    /// Report keys a module schema does not know as validation errors.
    pub strict: bool,
}

/// The inputs that decide which sources are consulted. Computed once per
/// resolution and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionContext {
    pub config_dir: PathBuf,
    pub tier: String,
    pub node: String,
    pub env_prefix: String,
    pub layout: Layout,
}

impl ResolutionContext {
    /// Compute the context from options, then `vars`, then discovery, then defaults.
    pub fn compute(options: &ResolveOptions, vars: &[(String, String)]) -> Self {
        let config_dir = options
            .config_dir
            .clone()
            .or_else(|| lookup(vars, CONFIG_DIR_VAR).map(PathBuf::from))
            .or_else(|| match &options.discover_from {
                Some(start) => source::find_config_root_from(start),
                None => source::find_config_root(),
            })
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));

        let tier = options
            .tier
            .clone()
            .or_else(|| lookup(vars, TIER_VAR).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_TIER.to_string());

        let node = options
            .node
            .clone()
            .or_else(|| lookup(vars, NODE_VAR).map(str::to_string))
            .or_else(|| lookup(vars, HOSTNAME_VAR).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_NODE.to_string());

        let env_prefix = options
            .env_prefix
            .clone()
            .unwrap_or_else(|| DEFAULT_ENV_PREFIX.to_string());

        let context = Self {
            config_dir,
            tier,
            node,
            env_prefix,
            layout: options.layout,
        };
        debug!(
            config_dir = %context.config_dir.display(),
            tier = %context.tier,
            node = %context.node,
            layout = ?context.layout,
            "computed resolution context"
        );
        context
    }
}

/// First non-empty value for `name`.
fn lookup<'a>(vars: &'a [(String, String)], name: &str) -> Option<&'a str> {
    vars.iter()
        .find(|(key, value)| key == name && !value.is_empty())
        .map(|(_, value)| value.as_str())
}
