use std::fmt;

use serde_json::{Map, Value};

/// A nested configuration mapping. Insertion order is preserved so diagnostics
/// print keys in the order the sources declared them.
pub type Tree = Map<String, Value>;

/// Reserved top-level key holding per-module sub-configurations.
pub const MODULES_KEY: &str = "modules";

/// A supported on-disk text format, selected by file extension.
///
/// Variants are declared in lookup priority order, so `Ord` ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    /// JSON5: comments, trailing commas, unquoted keys.
    Json5,
    /// Plain JSON.
    Json,
    /// TOML. Datetimes are read as strings.
    Toml,
}

impl Format {
    /// Every format in lookup priority order. When several files share a stem,
    /// the first format in this list wins and the others are ignored.
    pub const PRIORITY: [Format; 3] = [Format::Json5, Format::Json, Format::Toml];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Json5 => "json5",
            Format::Json => "json",
            Format::Toml => "toml",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|f| f.extension() == ext)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How tier and node files are laid out inside the config directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `config.*`, `env/<tier>.*`, `nodes/<node>.*`
    #[default]
    Nested,
    /// `base.*`, `<tier>.*`, `<node>.*`, all directly in the config directory.
    Flat,
}
