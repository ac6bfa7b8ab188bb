//! Layered, module-scoped configuration for multi-module server processes.
//!
//! trp-config assembles one configuration tree from several independent,
//! possibly-absent sources, caches it for the life of a [`Resolver`], and
//! hands each module a typed, validated view of its own slice.
//!
//! ```ignore
//! let resolver = Resolver::builder().build();
//! let chars: CharacterConfig = resolver.config_for("characters", None)?;
//! ```
//!
//! That call discovers the `config` directory, folds every layer found there,
//! applies `TRP__*` environment overrides, then deserializes
//! `modules.characters` into `CharacterConfig`, filling
//! `#[config(default)]` values and running its `validator` constraints.
//!
//! # Layer precedence
//!
//! ```text
//! Seed                  { tier, node, modules: {} }
//!        ↑ overridden by
//! Base file             config.*           (flat layout: base.*)
//!        ↑ overridden by
//! Tier file             env/<tier>.*       (flat layout: <tier>.*)
//!        ↑ overridden by
//! Node file             nodes/<node>.*     (flat layout: <node>.*)
//!        ↑ overridden by
//! Shared module file    modules.*          → merged into modules, keyed by name
//!        ↑ overridden by
//! Per-module files      modules/<name>.*   → merged into modules.<name>
//!        ↑ overridden by
//! Secrets file          secrets.*
//!        ↑ overridden by
//! Environment vars      TRP__path__to__key
//! ```
//!
//! Every layer is **sparse** and **optional**. A missing, empty or
//! undecodable file contributes nothing; it is logged and skipped, never
//! reported as an error. Mappings merge key by key; anything else, sequences
//! included, is replaced whole.
//!
//! # Formats
//!
//! Each logical file may be written as `json5`, `json` or `toml`. When more
//! than one exists for the same name, that order decides: the first one found
//! is read and the others are ignored with a warning.
//!
//! # Locating the config root
//!
//! In order: [`ResolverBuilder::config_dir`], the `TRP_CONFIG_DIR` variable,
//! a `config` directory found by walking up from the working directory (at
//! most six directories, the working directory included), and finally the
//! relative path `config`. The tier comes from `TRP_TIER` (default
//! `development`) and the node from `TRP_NODE`, then `HOSTNAME` (default
//! `local`).
//!
//! # Environment variables
//!
//! With the default prefix `TRP__`, variables map via double-underscore
//! nesting:
//!
//! | Env var | Config key |
//! |---------|------------|
//! | `TRP__db__mysql__port` | `db.mysql.port` |
//! | `TRP__modules__chat__limit` | `modules.chat.limit` |
//!
//! Segments keep their case. Values are typed heuristically: exactly `true`
//! or `false` → bool, then integer, then float, then string. With
//! [`normalize_env_keys`](ResolverBuilder::normalize_env_keys) a segment
//! also matches an existing key that differs only by `_` or case; two
//! variables that land on the same key then fail resolution with
//! [`ConfigError::AmbiguousOverride`].
//!
//! # Caching
//!
//! [`Resolver::load`] resolves at most once and returns the same `Arc` on
//! every later call, even if files change. There is no invalidation: build a
//! new resolver to start over, which is also how tests isolate themselves.
//! [`load_config`] and [`config_for`] use a process-wide resolver for code
//! that cannot thread one through.
//!
//! # Errors
//!
//! Module validation is the one failure callers must handle:
//! [`ConfigError::Validation`] carries a [`FieldError`] per problem.

pub mod error;
pub mod types;

mod compose;
mod context;
mod env;
pub(crate) mod merge;
mod module;
mod resolver;
mod source;

#[cfg(test)]
mod fixtures;

pub use compose::ComposedConfig;
pub use context::{
    CONFIG_DIR_VAR, DEFAULT_ENV_PREFIX, NODE_VAR, ResolutionContext, ResolveOptions, TIER_VAR,
};
pub use env::parse_env_value;
pub use error::{ConfigError, FieldError};
pub use merge::{deep_merge, merge_value};
pub use module::{MODULE_ROOT, ModuleSchema};
pub use resolver::{Resolver, ResolverBuilder, config_for, global, load_config};
pub use source::{find_config_root, find_config_root_from, try_read};
pub use types::{Format, Layout, MODULES_KEY, Tree};
