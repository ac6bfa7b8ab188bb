//! Reading configuration sources and discovering the config root.
//!
//! Every function here is infallible from the caller's point of view. A file
//! that is missing, unreadable, empty, undecodable, or whose top level is not
//! a mapping contributes nothing: it is reported as `None` and logged, never
//! raised. `Some(Tree::new())` (an explicit `{}`) is a present-but-empty
//! source and is kept distinct from absence.
//!
//! # Format priority
//!
//! A logical source such as `secrets` may exist in several formats. The first
//! format in [`Format::PRIORITY`] that has a file on disk is the only one
//! read; lower-priority siblings are ignored with a warning. Filesystem
//! enumeration order never decides which file wins.
//!
//! JSON5 integers must fit in an `i64`; a larger one makes the whole file
//! undecodable. TOML datetimes become strings in the tree.
//!
//! # Discovery
//!
//! [`find_config_root_from`] walks from a start directory toward the
//! filesystem root looking for a child directory named `config`, checking at
//! most [`DISCOVERY_DEPTH`] directories (the start directory included).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Number, Value};
use tracing::{debug, trace, warn};

use crate::types::{Format, Tree};

/// Name of the directory [`find_config_root_from`] looks for.
pub const CONFIG_DIR_NAME: &str = "config";

/// Number of directories inspected during discovery, starting directory included.
pub const DISCOVERY_DEPTH: usize = 6;

/// Read and decode one candidate file. `None` means "contributes nothing".
pub fn try_read(path: &Path) -> Option<Tree> {
    let format = format_of(path)?;
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!(path = %path.display(), "config source absent");
            return None;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable config source ignored");
            return None;
        }
    };

    if content.trim().is_empty() {
        debug!(path = %path.display(), "empty config source ignored");
        return None;
    }

    match decode(&content, format) {
        Ok(Value::Object(tree)) => Some(tree),
        Ok(_) => {
            warn!(path = %path.display(), "config source is not a mapping, ignored");
            None
        }
        Err(reason) => {
            warn!(path = %path.display(), %format, %reason, "undecodable config source ignored");
            None
        }
    }
}

/// Pick the file for `{dir}/{stem}.*`, honoring [`Format::PRIORITY`].
pub fn locate(dir: &Path, stem: &str) -> Option<PathBuf> {
    let mut candidates = Format::PRIORITY
        .iter()
        .map(|format| dir.join(format!("{stem}.{}", format.extension())))
        .filter(|path| path.is_file());

    let chosen = candidates.next()?;
    for shadowed in candidates {
        warn!(
            chosen = %chosen.display(),
            shadowed = %shadowed.display(),
            "ignoring lower-priority config file"
        );
    }
    Some(chosen)
}

/// Locate and read one logical layer.
pub fn read_layer(dir: &Path, stem: &str) -> Option<(PathBuf, Tree)> {
    let path = locate(dir, stem)?;
    let tree = try_read(&path)?;
    Some((path, tree))
}

/// List per-module files in `dir`, one per module name, sorted by name.
///
/// The listing is not recursive. Files without a supported extension and
/// dotfiles are skipped. When a module has files in several formats only the
/// highest-priority one is returned.
pub fn module_files(dir: &Path) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return vec![],
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "unreadable modules directory ignored");
            return vec![];
        }
    };

    let mut found: Vec<(String, Format, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(format) = format_of(&path) else {
            continue;
        };
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.is_empty() || stem.starts_with('.') {
            continue;
        }
        found.push((stem.to_string(), format, path));
    }

    found.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));

    let mut modules: Vec<(String, PathBuf)> = Vec::with_capacity(found.len());
    for (name, _, path) in found {
        if let Some((last, chosen)) = modules.last()
            && *last == name
        {
            warn!(
                module = %name,
                chosen = %chosen.display(),
                shadowed = %path.display(),
                "ignoring lower-priority module file"
            );
            continue;
        }
        modules.push((name, path));
    }
    modules
}

/// Discover the config root starting from the current working directory.
pub fn find_config_root() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_root_from(&cwd)
}

/// Like [`find_config_root`] but starting from an explicit directory.
pub fn find_config_root_from(start: &Path) -> Option<PathBuf> {
    let mut current = start;
    for _ in 0..DISCOVERY_DEPTH {
        let candidate = current.join(CONFIG_DIR_NAME);
        if candidate.is_dir() {
            debug!(path = %candidate.display(), "discovered config root");
            return Some(candidate);
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => break, // reached root
        }
    }
    debug!(start = %start.display(), "no config root found during discovery");
    None
}

fn format_of(path: &Path) -> Option<Format> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(Format::from_extension)
}

fn decode(content: &str, format: Format) -> Result<Value, String> {
    match format {
        Format::Json5 => json5::from_str(content).map_err(|e| {
            let reason = e.to_string();
            if reason.contains("error parsing integer") {
                format!("{reason} (json5 integers must fit in a signed 64-bit value)")
            } else {
                reason
            }
        }),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str::<toml::Table>(content)
            .map(|table| from_toml(toml::Value::Table(table)))
            .map_err(|e| e.to_string()),
    }
}

fn from_toml(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(from_toml).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(key, value)| (key, from_toml(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    // --- try_read ---

    #[test]
    fn missing_file_is_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&dir.path().join("nope.json")), None);
    }

    #[test]
    fn empty_and_blank_files_are_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&write(dir.path(), "a.json", "")), None);
        assert_eq!(try_read(&write(dir.path(), "b.json5", "  \n\t")), None);
    }

    #[test]
    fn empty_mapping_is_present() {
        let dir = TempDir::new().unwrap();
        let tree = try_read(&write(dir.path(), "a.json", "{}")).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn invalid_content_is_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&write(dir.path(), "a.json", "{ not json")), None);
    }

    #[test]
    fn non_mapping_top_level_is_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&write(dir.path(), "a.json", "[1, 2]")), None);
        assert_eq!(try_read(&write(dir.path(), "b.json5", "42")), None);
    }

    #[test]
    fn unsupported_extension_is_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&write(dir.path(), "a.yaml", "a: 1")), None);
    }

    #[test]
    fn json5_accepts_comments_and_trailing_commas() {
        let dir = TempDir::new().unwrap();
        let path = write(
            dir.path(),
            "a.json5",
            "{\n  // listener\n  port: 3306,\n  hosts: ['a', 'b',],\n}\n",
        );
        let tree = try_read(&path).unwrap();
        assert_eq!(tree["port"], 3306);
        assert_eq!(tree["hosts"], json!(["a", "b"]));
    }

    #[test]
    fn json_is_strict_about_trailing_commas() {
        let dir = TempDir::new().unwrap();
        assert_eq!(try_read(&write(dir.path(), "a.json", r#"{"a": 1,}"#)), None);
    }

    #[test]
    fn toml_is_decoded_into_a_tree() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "a.toml", "[db.mysql]\nport = 3306\n");
        let tree = try_read(&path).unwrap();
        assert_eq!(tree["db"]["mysql"]["port"], 3306);
    }

    #[test]
    fn toml_datetimes_become_strings() {
        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "a.toml", "when = 1979-05-27T07:32:00Z
z = 1
a = 2
");
        let tree = try_read(&path).unwrap();
        assert_eq!(tree["when"], "1979-05-27T07:32:00Z");
        let keys: Vec<&str> = tree.keys().map(String::as_str).collect();
        assert_eq!(keys, ["when", "z", "a"]);
    }

    #[test]
    fn json5_integers_are_limited_to_i64() {
        let dir = TempDir::new().unwrap();
        let big = "18446744073709551615";
        assert_eq!(try_read(&write(dir.path(), "a.json5", &format!("{{id: {big}}}"))), None);
        let tree = try_read(&write(dir.path(), "a.json", &format!(r#"{{"id": {big}}}"#))).unwrap();
        assert_eq!(tree["id"], json!(u64::MAX));
    }

    #[test]
    fn json5_oversized_integer_is_explained() {
        let reason = decode("{id: 18446744073709551615}", Format::Json5).unwrap_err();
        assert!(reason.contains("signed 64-bit"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_absent() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = write(dir.path(), "a.json", r#"{"a": 1}"#);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();

        // Root can still read the file; only assert when permissions bite.
        if fs::read_to_string(&path).is_err() {
            assert_eq!(try_read(&path), None);
        }

        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    }

    // --- read_layer / locate ---

    #[test]
    fn read_layer_prefers_json5_over_json() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "secrets.json", r#"{"from": "json"}"#);
        write(dir.path(), "secrets.json5", "{from: 'json5'}");
        let (path, tree) = read_layer(dir.path(), "secrets").unwrap();
        assert!(path.ends_with("secrets.json5"));
        assert_eq!(tree["from"], "json5");
    }

    #[test]
    fn read_layer_falls_back_to_lower_priority_format() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "secrets.toml", "from = \"toml\"\n");
        let (_, tree) = read_layer(dir.path(), "secrets").unwrap();
        assert_eq!(tree["from"], "toml");
    }

    #[test]
    fn read_layer_does_not_fall_through_on_invalid_winner() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "base.json5", "{ broken");
        write(dir.path(), "base.json", r#"{"a": 1}"#);
        assert_eq!(read_layer(dir.path(), "base"), None);
    }

    #[test]
    fn read_layer_missing_is_absent() {
        let dir = TempDir::new().unwrap();
        assert_eq!(read_layer(dir.path(), "base"), None);
    }

    // --- module_files ---

    #[test]
    fn module_files_sorted_and_deduplicated() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "zeta.json", "{}");
        write(dir.path(), "alpha.json", "{}");
        write(dir.path(), "alpha.json5", "{}");
        write(dir.path(), "notes.txt", "ignored");
        write(dir.path(), ".hidden.json", "{}");
        fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = module_files(dir.path());
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert!(files[0].1.ends_with("alpha.json5"));
    }

    #[test]
    fn module_files_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(module_files(&dir.path().join("modules")).is_empty());
    }

    // --- discovery ---

    fn nested(root: &Path, depth: usize) -> PathBuf {
        let mut dir = root.to_path_buf();
        for i in 0..depth {
            dir = dir.join(format!("l{i}"));
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn discovery_finds_config_in_start_dir() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("config")).unwrap();
        assert_eq!(
            find_config_root_from(root.path()),
            Some(root.path().join("config"))
        );
    }

    #[test]
    fn discovery_finds_config_five_levels_up() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("config")).unwrap();
        let start = nested(root.path(), 5);
        assert_eq!(
            find_config_root_from(&start),
            Some(root.path().join("config"))
        );
    }

    #[test]
    fn discovery_gives_up_seven_levels_up() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("config")).unwrap();
        let start = nested(root.path(), 7);
        assert_eq!(find_config_root_from(&start), None);
    }

    #[test]
    fn discovery_prefers_nearest_config() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("config")).unwrap();
        let start = nested(root.path(), 2);
        fs::create_dir(root.path().join("l0").join("config")).unwrap();
        assert_eq!(
            find_config_root_from(&start),
            Some(root.path().join("l0").join("config"))
        );
    }

    #[test]
    fn discovery_ignores_config_files() {
        let root = TempDir::new().unwrap();
        write(root.path(), "config", "not a directory");
        let start = nested(root.path(), 5);
        assert_eq!(find_config_root_from(&start), None);
    }
}
