//! Layer composition: fold every available source into one tree.
//!
//! The fold order is fixed, lowest priority first:
//!
//! ```text
//! seed        { tier, node, modules: {} }
//! base        config.*            (Flat: base.*)
//! tier        env/<tier>.*        (Flat: <tier>.*)
//! node        nodes/<node>.*      (Flat: <node>.*)
//! shared      modules.*           merged into modules, keyed by module name
//! module      modules/<name>.*    merged into modules.<name>
//! secrets     secrets.*
//! ```
//!
//! Every layer is optional. An absent layer leaves the accumulator untouched.
//! [`layer_plan`] decides which files to consult, [`load_layers`] reads them,
//! and [`compose`] folds pre-loaded layers without touching the filesystem.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, trace};

use crate::context::ResolutionContext;
use crate::error::ConfigError;
use crate::merge::deep_merge;
use crate::source;
use crate::types::{Layout, MODULES_KEY, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Base,
    Tier,
    Node,
    Shared,
    Module,
    Secrets,
}

/// Where a layer's contents are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The top level of the tree.
    Root,
    /// The `modules` mapping, one key per module.
    Modules,
    /// `modules.<name>`.
    Module(String),
}

/// One candidate source, before reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    /// `{dir}/{stem}.*`, resolved through the format priority.
    Stem { dir: PathBuf, stem: String },
    /// An already-located file.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLayer {
    pub kind: LayerKind,
    pub candidate: Candidate,
    pub target: Target,
}

/// A layer that was found and decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub kind: LayerKind,
    pub path: PathBuf,
    pub target: Target,
    pub tree: Tree,
}

/// The minimal tree every composition starts from.
pub fn seed(ctx: &ResolutionContext) -> Tree {
    let mut tree = Tree::new();
    tree.insert("tier".into(), Value::String(ctx.tier.clone()));
    tree.insert("node".into(), Value::String(ctx.node.clone()));
    tree.insert(MODULES_KEY.into(), Value::Object(Tree::new()));
    tree
}

/// List the candidate sources for `ctx` in fold order.
///
/// Lists the `modules/` directory to plan one layer per module file.
pub fn layer_plan(ctx: &ResolutionContext) -> Vec<PlannedLayer> {
    let dir = ctx.config_dir.as_path();
    let (base, tier, node) = match ctx.layout {
        Layout::Nested => (
            stem(dir, "config"),
            stem(&dir.join("env"), &ctx.tier),
            stem(&dir.join("nodes"), &ctx.node),
        ),
        Layout::Flat => (
            stem(dir, "base"),
            stem(dir, &ctx.tier),
            stem(dir, &ctx.node),
        ),
    };

    let mut plan = vec![
        root(LayerKind::Base, base),
        root(LayerKind::Tier, tier),
        root(LayerKind::Node, node),
        PlannedLayer {
            kind: LayerKind::Shared,
            candidate: stem(dir, MODULES_KEY),
            target: Target::Modules,
        },
    ];

    for (name, path) in source::module_files(&dir.join(MODULES_KEY)) {
        plan.push(PlannedLayer {
            kind: LayerKind::Module,
            candidate: Candidate::File(path),
            target: Target::Module(name),
        });
    }

    plan.push(root(LayerKind::Secrets, stem(dir, "secrets")));
    plan
}

/// Read every planned layer, dropping the ones that contribute nothing.
pub fn load_layers(plan: Vec<PlannedLayer>) -> Vec<Layer> {
    plan.into_iter()
        .filter_map(|planned| {
            let (path, tree) = match planned.candidate {
                Candidate::Stem { dir, stem } => source::read_layer(&dir, &stem),
                Candidate::File(path) => source::try_read(&path).map(|tree| (path, tree)),
            }
            .or_else(|| {
                trace!(kind = ?planned.kind, "config layer absent");
                None
            })?;
            Some(Layer {
                kind: planned.kind,
                path,
                target: planned.target,
                tree,
            })
        })
        .collect()
}

/// Fold pre-loaded layers over `seed`. No I/O happens here.
pub fn compose(seed: Tree, layers: Vec<Layer>) -> Tree {
    layers.into_iter().fold(seed, |acc, layer| {
        debug!(kind = ?layer.kind, path = %layer.path.display(), "applying config layer");
        match layer.target {
            Target::Root => deep_merge(acc, layer.tree),
            Target::Modules => deep_merge(acc, under_modules(layer.tree)),
            Target::Module(name) => {
                let mut modules = Tree::new();
                modules.insert(name, Value::Object(layer.tree));
                deep_merge(acc, under_modules(modules))
            }
        }
    })
}

fn under_modules(modules: Tree) -> Tree {
    let mut overlay = Tree::new();
    overlay.insert(MODULES_KEY.into(), Value::Object(modules));
    overlay
}

/// Plan, read and fold every file layer for `ctx`.
pub fn compose_context(ctx: &ResolutionContext) -> Tree {
    compose(seed(ctx), load_layers(layer_plan(ctx)))
}

fn stem(dir: &Path, stem: &str) -> Candidate {
    Candidate::Stem {
        dir: dir.to_path_buf(),
        stem: stem.to_string(),
    }
}

fn root(kind: LayerKind, candidate: Candidate) -> PlannedLayer {
    PlannedLayer {
        kind,
        candidate,
        target: Target::Root,
    }
}

/// The fully resolved configuration: the composed tree plus the context it
/// was resolved under. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedConfig {
    tree: Tree,
    context: ResolutionContext,
}

impl ComposedConfig {
    pub fn new(tree: Tree, context: ResolutionContext) -> Self {
        Self { tree, context }
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.context
    }

    /// Raw sub-configuration of `module`, if any source provided one.
    pub fn module(&self, module: &str) -> Option<&Value> {
        self.tree.get(MODULES_KEY)?.get(module)
    }

    /// Look up a dotted key such as `db.mysql.port`.
    pub fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        let mut segments = key.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self
            .tree
            .get(first)
            .ok_or_else(|| ConfigError::KeyNotFound(key.into()))?;
        for segment in segments {
            current = current
                .get(segment)
                .ok_or_else(|| ConfigError::KeyNotFound(key.into()))?;
        }
        Ok(current)
    }

    /// Every leaf as `(dotted.key, value)`, in declaration order.
    ///
    /// Sequences are leaves. Empty mappings are listed as `{}` so they stay
    /// visible.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        flatten_into(&self.tree, "", &mut out);
        out
    }

    /// Pretty JSON rendering of the whole tree, keys in declaration order.
    pub fn to_pretty_string(&self) -> String {
        serde_json::to_string_pretty(&self.tree).unwrap_or_default()
    }
}

fn flatten_into(tree: &Tree, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in tree {
        let dotted = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(map) if !map.is_empty() => flatten_into(map, &dotted, out),
            other => out.push((dotted, other.to_string())),
        }
    }
}
