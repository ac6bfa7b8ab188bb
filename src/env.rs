use std::collections::BTreeMap;

use serde_json::{Number, Value};
use tracing::debug;

use crate::error::ConfigError;
use crate::types::Tree;

/// Path-segment delimiter inside override variable names.
pub const SEGMENT_DELIMITER: &str = "__";

/// Apply environment overrides matching `prefix` on top of `tree`.
///
/// `TRP__db__mysql__port=5432` writes `5432` at `db.mysql.port`. The prefix is
/// stripped and the remainder is split on `__`. Segments keep their case
/// unless `normalize` is set, in which case a segment reuses any existing key
/// at its level that matches after removing `_` and lowercasing.
///
/// Intermediate mappings are created as needed. An intermediate that exists
/// but is not a mapping is replaced by an empty one.
///
/// Variables are applied in path order, segment by segment (normalized when
/// `normalize` is set), so a parent path (`TRP__a`) is always written before
/// its children (`TRP__a__b`, `TRP__A__b`) and the children win. With
/// `normalize`, two variables that resolve to the same path are rejected
/// instead of one silently winning.
///
/// Takes an iterator so tests can pass synthetic data instead of the process
/// environment. With no matching variable the tree is returned as is.
pub fn apply_overrides(
    tree: Tree,
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
    normalize: bool,
) -> Result<Tree, ConfigError> {
    let mut overrides: Vec<(String, Vec<String>, String)> = Vec::new();
    for (name, value) in vars {
        let Some(rest) = name.strip_prefix(prefix) else {
            continue;
        };
        let segments: Vec<String> = rest.split(SEGMENT_DELIMITER).map(str::to_string).collect();
        if rest.is_empty() || segments.iter().any(String::is_empty) {
            debug!(var = %name, "ignoring malformed override variable");
            continue;
        }
        overrides.push((name, segments, value));
    }

    if overrides.is_empty() {
        return Ok(tree);
    }

    overrides.sort_by_cached_key(|(name, segments, _)| {
        (sort_path(segments, normalize), name.clone())
    });
    if normalize {
        reject_collisions(&overrides)?;
    }

    let mut tree = tree;
    for (name, segments, value) in overrides {
        debug!(var = %name, path = %segments.join("."), "applying environment override");
        set_path(&mut tree, &segments, parse_env_value(&value), normalize);
    }
    Ok(tree)
}

/// Parse an env var value into a typed value.
/// Tries: exact `true`/`false` → integer → finite float → string.
pub fn parse_env_value(s: &str) -> Value {
    match s {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return Value::from(u);
    }
    // `Number::from_f64` refuses NaN and infinities, which keeps "nan"/"inf" as strings.
    if let Ok(f) = s.parse::<f64>()
        && let Some(n) = Number::from_f64(f)
    {
        return Value::Number(n);
    }
    Value::String(s.to_string())
}

fn set_path(tree: &mut Tree, segments: &[String], value: Value, normalize: bool) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut current = tree;
    for segment in parents {
        let key = resolve_key(current, segment, normalize);
        let slot = current
            .entry(key)
            .or_insert_with(|| Value::Object(Tree::new()));
        if !slot.is_object() {
            *slot = Value::Object(Tree::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        current = next;
    }

    let key = resolve_key(current, leaf, normalize);
    current.insert(key, value);
}

fn resolve_key(map: &Tree, segment: &str, normalize: bool) -> String {
    if normalize {
        let wanted = normalize_segment(segment);
        if let Some(existing) = map.keys().find(|k| normalize_segment(k) == wanted) {
            return existing.clone();
        }
    }
    segment.to_string()
}

fn sort_path(segments: &[String], normalize: bool) -> Vec<String> {
    if normalize {
        segments.iter().map(|s| normalize_segment(s)).collect()
    } else {
        segments.to_vec()
    }
}

fn normalize_segment(segment: &str) -> String {
    segment
        .chars()
        .filter(|c| *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn reject_collisions(overrides: &[(String, Vec<String>, String)]) -> Result<(), ConfigError> {
    let mut by_path: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, segments, _) in overrides {
        let path = sort_path(segments, true).join(".");
        by_path.entry(path).or_default().push(name.clone());
    }
    match by_path.into_iter().find(|(_, names)| names.len() > 1) {
        Some((path, vars)) => Err(ConfigError::AmbiguousOverride { path, vars }),
        None => Ok(()),
    }
}
